//! Validation helpers for player identities.

use validator::ValidationError;

/// Validates that `identity` may take part in the quiz.
///
/// # Examples
///
/// ```ignore
/// validate_identity("alice", "quizbot")   // Ok
/// validate_identity("QuizBot", "quizbot") // Err - reserved for the bot
/// validate_identity("!alice", "quizbot")  // Err - command prefix
/// ```
pub fn validate_identity(identity: &str, bot_nickname: &str) -> Result<(), ValidationError> {
    let identity = identity.trim();

    if identity.is_empty() {
        let mut err = ValidationError::new("identity_empty");
        err.message = Some("Identity must not be empty".into());
        return Err(err);
    }

    if identity
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        let mut err = ValidationError::new("identity_format");
        err.message = Some("Identity must not contain whitespace or control characters".into());
        return Err(err);
    }

    if identity.starts_with(['!', '#']) {
        let mut err = ValidationError::new("identity_prefix");
        err.message = Some(format!("Identity must not start with `{}`", &identity[..1]).into());
        return Err(err);
    }

    if identity.eq_ignore_ascii_case(bot_nickname.trim()) {
        let mut err = ValidationError::new("identity_reserved");
        err.message = Some("Identity is reserved for the bot".into());
        return Err(err);
    }

    Ok(())
}
