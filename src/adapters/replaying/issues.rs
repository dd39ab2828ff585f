//! Replaying adapter for the `IssueClient` port.

use std::sync::Mutex;

use super::replay_result;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::issues::{IssueClient, IssueFuture, RemoteIssue};

/// Serves recorded issue client results from a cassette.
///
/// Inputs are ignored; each method replays its own queue in recorded order.
pub struct ReplayingIssueClient {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingIssueClient {
    /// Create a replaying issue client backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }

    fn next_output(&self, method: &str) -> serde_json::Value {
        let mut replayer = self.replayer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        replayer.next_interaction("issues", method).output.clone()
    }
}

impl IssueClient for ReplayingIssueClient {
    fn list<'a>(&'a self, _owner: &'a str, _repo: &'a str) -> IssueFuture<'a, Vec<RemoteIssue>> {
        let output = self.next_output("list");
        Box::pin(async move { replay_result("list", output) })
    }

    fn create<'a>(
        &'a self,
        _owner: &'a str,
        _repo: &'a str,
        _title: &'a str,
        _body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        let output = self.next_output("create");
        Box::pin(async move { replay_result("create", output) })
    }

    fn edit<'a>(
        &'a self,
        _owner: &'a str,
        _repo: &'a str,
        _number: u64,
        _body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        let output = self.next_output("edit");
        Box::pin(async move { replay_result("edit", output) })
    }

    fn close<'a>(&'a self, _owner: &'a str, _repo: &'a str, _number: u64)
        -> IssueFuture<'a, RemoteIssue> {
        let output = self.next_output("close");
        Box::pin(async move { replay_result("close", output) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use crate::ports::issues::IssueClientError;
    use chrono::Utc;
    use serde_json::json;

    fn make_replayer(interactions: Vec<Interaction>) -> CassetteReplayer {
        CassetteReplayer::new(&Cassette { name: "test".into(), recorded_at: Utc::now(), interactions })
    }

    #[tokio::test]
    async fn replays_recorded_list_then_failure() {
        let issue = json!({
            "number": 7,
            "title": "Crash",
            "description": "boom",
            "state": "open",
            "has_linked_change": false,
            "url": "https://github.com/acme/app/issues/7",
        });
        let replayer = make_replayer(vec![
            Interaction {
                seq: 0,
                port: "issues".into(),
                method: "list".into(),
                input: json!({"owner": "acme", "repo": "app"}),
                output: json!({"Ok": [issue]}),
            },
            Interaction {
                seq: 1,
                port: "issues".into(),
                method: "close".into(),
                input: json!({"owner": "acme", "repo": "app", "number": 7}),
                output: json!({"Err": {"Transient": "timeout"}}),
            },
        ]);
        let client = ReplayingIssueClient::new(replayer);

        let issues = client.list("acme", "app").await.unwrap();
        assert_eq!(issues[0].number, 7);
        assert_eq!(
            client.close("acme", "app", 7).await.unwrap_err(),
            IssueClientError::Transient("timeout".into())
        );
    }
}
