use reqwest::Response;

/// Read the body of a response that is about to be reported as a failure.
///
/// Never fails: an unreadable body is replaced by a placeholder describing
/// why it could not be read.
pub async fn failure_body(response: Response) -> String {
    match response.text().await {
        Ok(text) => text,
        Err(err) => format!("<failed to read the body: {}>", err),
    }
}
