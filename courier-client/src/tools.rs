//! Text handlers for the three login tools: status, send code, send password.

use crate::auth::{AuthOrchestrator, AuthState};

/// What a tool call returns to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub text:     String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

pub fn auth_status(auth: &AuthOrchestrator) -> ToolOutput {
    let snapshot = auth.snapshot();
    let mut text = format!("Auth state: {}", snapshot.state);
    if snapshot.state == AuthState::Error {
        text.push_str(&format!("\nError: {}", snapshot.error));
    }
    ToolOutput::text(text)
}

pub async fn auth_send_code(auth: &AuthOrchestrator, code: &str) -> ToolOutput {
    match auth.submit_code(code.trim()).await {
        Err(e) => ToolOutput::error(format!("auth failed: {e}")),
        Ok(AuthState::WaitingPassword) => ToolOutput::text(
            "Code accepted. 2FA password required, submit it with the send-password tool.",
        ),
        Ok(AuthState::Authenticated) => ToolOutput::text("Authenticated successfully."),
        Ok(state) => ToolOutput::text(format!("Code submitted. State: {state}")),
    }
}

pub async fn auth_send_password(auth: &AuthOrchestrator, password: &str) -> ToolOutput {
    match auth.submit_password(password).await {
        Err(e) => ToolOutput::error(format!("auth failed: {e}")),
        Ok(AuthState::Authenticated) => ToolOutput::text("Authenticated successfully."),
        Ok(state) => ToolOutput::text(format!("Password submitted. State: {state}")),
    }
}
