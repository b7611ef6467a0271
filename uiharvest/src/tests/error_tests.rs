use crate::errors::ERROR_KINDS;
use crate::HarvestError;

fn every_variant() -> Vec<HarvestError> {
    vec![
        HarvestError::WindowNotFound("w".into()),
        HarvestError::ProcessNotFound(1),
        HarvestError::AccessDenied(1),
        HarvestError::ElementUnavailable("e".into()),
        HarvestError::ExtractionFailed("x".into()),
        HarvestError::LaunchFailed {
            path: "a.exe".into(),
            reason: "missing".into(),
        },
        HarvestError::TerminationFailed {
            pid: 1,
            reason: "still alive".into(),
        },
        HarvestError::CaptureFailed("c".into()),
        HarvestError::InvalidArgument("i".into()),
        HarvestError::UnsupportedPlatform("p".into()),
        HarvestError::PlatformError("p".into()),
        HarvestError::Io(std::io::Error::other("io")),
        HarvestError::Internal("i".into()),
    ]
}

#[test]
fn test_every_kind_is_documented_and_distinct() {
    let kinds: Vec<_> = every_variant().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, ERROR_KINDS);
}

#[test]
fn test_only_not_found_conditions_are_retryable() {
    let retryable: Vec<_> = every_variant()
        .into_iter()
        .filter(|e| e.is_retryable())
        .map(|e| e.kind())
        .collect();
    assert_eq!(
        retryable,
        vec!["window_not_found", "process_not_found", "element_unavailable"]
    );
}
