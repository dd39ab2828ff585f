//! Recording adapter for the `IssueClient` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::issues::{IssueClient, IssueFuture, RemoteIssue};

/// Records issue client interactions while delegating to an inner implementation.
pub struct RecordingIssueClient {
    inner: Arc<dyn IssueClient>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingIssueClient {
    /// Creates a new recording client wrapping the given implementation.
    pub fn new(inner: Arc<dyn IssueClient>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct ListInput<'a> {
    owner: &'a str,
    repo: &'a str,
}

#[derive(Serialize)]
struct CreateInput<'a> {
    owner: &'a str,
    repo: &'a str,
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct EditInput<'a> {
    owner: &'a str,
    repo: &'a str,
    number: u64,
    body: &'a str,
}

#[derive(Serialize)]
struct CloseInput<'a> {
    owner: &'a str,
    repo: &'a str,
    number: u64,
}

impl IssueClient for RecordingIssueClient {
    fn list<'a>(&'a self, owner: &'a str, repo: &'a str) -> IssueFuture<'a, Vec<RemoteIssue>> {
        Box::pin(async move {
            let result = self.inner.list(owner, repo).await;
            record_result(&self.recorder, "issues", "list", &ListInput { owner, repo }, &result);
            result
        })
    }

    fn create<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        title: &'a str,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let result = self.inner.create(owner, repo, title, body).await;
            let input = CreateInput { owner, repo, title, body };
            record_result(&self.recorder, "issues", "create", &input, &result);
            result
        })
    }

    fn edit<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        number: u64,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let result = self.inner.edit(owner, repo, number, body).await;
            let input = EditInput { owner, repo, number, body };
            record_result(&self.recorder, "issues", "edit", &input, &result);
            result
        })
    }

    fn close<'a>(&'a self, owner: &'a str, repo: &'a str, number: u64)
        -> IssueFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let result = self.inner.close(owner, repo, number).await;
            let input = CloseInput { owner, repo, number };
            record_result(&self.recorder, "issues", "close", &input, &result);
            result
        })
    }
}
