use super::*;

#[test]
fn status_names_round_trip() {
    for &status in ReleaseStatus::all() {
        let parsed: ReleaseStatus = status.as_str().parse().unwrap();
        assert_eq!(parsed, status, "round-trip failed for {:?}", status);
    }
}

#[test]
fn status_aliases_resolve() {
    let cases = [
        ("Airing", ReleaseStatus::Ongoing),
        ("completed", ReleaseStatus::Finished),
        (" upcoming ", ReleaseStatus::Announced),
    ];
    for (input, expected) in cases {
        assert_eq!(input.parse::<ReleaseStatus>().unwrap(), expected, "{input}");
    }
}

#[test]
fn unknown_status_is_rejected() {
    let err = "cancelled".parse::<ReleaseStatus>().unwrap_err();
    assert_eq!(err, ModelError::UnknownStatus("cancelled".to_string()));
}

#[test]
fn newer_only_when_strictly_greater() {
    let release = Release {
        id: 7,
        title: "Frieren".to_string(),
        status: ReleaseStatus::Ongoing,
        episode_count: 12,
        poster: None,
        updated_at: 1_700_000_000,
    };
    assert!(release.is_newer_than(1_699_999_999));
    assert!(!release.is_newer_than(1_700_000_000));
    assert!(!release.is_newer_than(1_700_000_001));
}
