//! Replaying adapters that serve recorded interactions.

pub mod issues;

pub use issues::ReplayingIssueClient;

use serde::de::DeserializeOwned;

use crate::ports::issues::IssueClientError;

/// Decode a recorded `{"Ok": v}` / `{"Err": e}` output back into a result.
///
/// Mirror of `recording::record_result`. A cassette entry that fits neither
/// shape is reported as a [`IssueClientError::Decode`].
pub(crate) fn replay_result<T>(
    method: &str,
    output: serde_json::Value,
) -> Result<T, IssueClientError>
where
    T: DeserializeOwned,
{
    let malformed = |detail: String| {
        IssueClientError::Decode(format!("cassette entry for {method} is malformed: {detail}"))
    };

    match output {
        serde_json::Value::Object(mut map) => {
            if let Some(ok) = map.remove("Ok") {
                return serde_json::from_value(ok).map_err(|e| malformed(e.to_string()));
            }
            if let Some(err) = map.remove("Err") {
                let err: IssueClientError =
                    serde_json::from_value(err).map_err(|e| malformed(e.to_string()))?;
                return Err(err);
            }
            Err(malformed("expected an Ok or Err key".into()))
        }
        other => Err(malformed(format!("expected an object, got {other}"))),
    }
}
