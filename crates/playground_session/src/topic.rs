use crate::error::SessionError;

/// Checks a topic name against the `{prefix}{name}` convention.
///
/// `name` must be non-empty and only use `[A-Za-z0-9-_.~%]`.
pub fn validate_topic(prefix: &str, topic: &str) -> Result<(), SessionError> {
    let name = topic
        .strip_prefix(prefix)
        .ok_or_else(|| SessionError::InvalidTopicName(topic.to_string()))?;

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'));

    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidTopicName(topic.to_string()))
    }
}
