use std::borrow::Cow;

/// Status codes reported by launchctl (errno values) and Authorization Services
const STATUS_TEXT: &[(i32, &str)] = &[
    (0, "No error"),
    (1, "Operation not permitted"),
    (2, "No such file or directory"),
    (3, "No such process"),
    (5, "Input/output error"),
    (13, "Permission denied"),
    (16, "Resource busy"),
    (17, "Service already loaded"),
    (22, "Invalid argument"),
    (36, "Operation now in progress"),
    (37, "Operation already in progress"),
    (113, "Could not find specified service"),
    (119, "Service is disabled"),
    (-60001, "The authorization rights are invalid"),
    (-60002, "The authorization reference is invalid"),
    (-60003, "The authorization tag is invalid"),
    (-60004, "The returned authorization is invalid"),
    (-60005, "The authorization was denied"),
    (-60006, "The authorization was cancelled by the user"),
    (-60007, "The authorization was denied since no user interaction was possible"),
    (-60008, "Unable to obtain authorization for this operation"),
    (-60009, "The authorization is not allowed to be converted to an external format"),
    (-60010, "The authorization is not allowed to be created from an external format"),
    (-60011, "The provided option flag(s) are invalid for this authorization operation"),
    (-60031, "The specified program could not be executed"),
    (-60032, "An invalid status was returned during execution of a privileged tool"),
    (-60033, "The requested socket address is invalid"),
];

/// Descriptive text for a status code
pub fn error_text_for_status(code: i32) -> Cow<'static, str> {
    STATUS_TEXT
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, text)| Cow::Borrowed(*text))
        .unwrap_or_else(|| Cow::Owned(format!("Unknown status code {}", code)))
}
