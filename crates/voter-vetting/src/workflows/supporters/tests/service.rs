use super::common::*;
use std::sync::Arc;

use crate::config::ReconciliationConfig;
use crate::workflows::matching::Matcher;
use crate::workflows::supporters::{
    InMemoryReviewQueue, SupporterFilter, SupporterId, SupporterRepository, SupporterService,
    SupporterServiceError, VerificationStatus, VettingOutcome,
};
use crate::workflows::{RepositoryError, StopSignal};

#[test]
fn create_rejects_blank_names() {
    let (service, _, _) = build_service(juan_cruz_roll(), &ReconciliationConfig::default());

    match service.create(submission("  ", "Cruz", Some(BARRIGADA))) {
        Err(SupporterServiceError::Invalid(_)) => {}
        other => panic!("expected invalid submission, got {other:?}"),
    }
}

#[test]
fn create_stores_the_normalized_phone_and_reports_duplicates() {
    let (service, _, _) = build_service(juan_cruz_roll(), &ReconciliationConfig::default());

    let first = service
        .create(with_phone(submission("Ana", "Santos", Some(DEDEDO)), "(671) 555-0100"))
        .expect("create succeeds");
    assert_eq!(
        first.supporter.normalized_phone.as_deref(),
        Some("6715550100")
    );
    assert!(first.duplicates.is_empty());

    let second = service
        .create(with_phone(submission("Juan", "Cruz", Some(BARRIGADA)), "1-671-555-0100"))
        .expect("create succeeds");
    assert_eq!(second.duplicates, vec![first.supporter.id]);
    assert!(second.supporter.potential_duplicate);
    assert_eq!(second.supporter.duplicate_of_id, Some(first.supporter.id));
}

#[test]
fn duplicate_partners_are_flagged_and_cleared_with_the_edited_record() {
    let (service, repository, _) =
        build_service(juan_cruz_roll(), &ReconciliationConfig::default());

    let first = service
        .create(with_phone(submission("Ana", "Santos", Some(DEDEDO)), "671-555-0100"))
        .expect("create succeeds");
    let second = service
        .create(with_phone(submission("Juan", "Cruz", Some(BARRIGADA)), "671-555-0100"))
        .expect("create succeeds");

    let partner = fetch(&repository, first.supporter.id);
    assert!(partner.potential_duplicate);
    assert_eq!(partner.duplicate_of_id, Some(second.supporter.id));

    let report = service
        .update(
            second.supporter.id,
            with_phone(submission("Juan", "Cruz", Some(BARRIGADA)), "671-555-0199"),
        )
        .expect("update succeeds");
    assert!(report.duplicates.is_empty());
    assert!(!report.supporter.potential_duplicate);

    let partner = fetch(&repository, first.supporter.id);
    assert!(!partner.potential_duplicate);
    assert_eq!(partner.duplicate_of_id, None);
}

#[test]
fn update_without_identity_change_skips_vetting() {
    let (service, _, _) = build_service(juan_cruz_roll(), &ReconciliationConfig::default());
    let created = service
        .create(with_dob(submission("Juan", "Cruz", Some(BARRIGADA)), 1985, 3, 15))
        .expect("create succeeds");

    let edited = with_phone(
        with_dob(submission("Juan", "Cruz", Some(BARRIGADA)), 1985, 3, 15),
        "671-555-0100",
    );
    let report = service
        .update(created.supporter.id, edited)
        .expect("update succeeds");

    assert!(report.vetting.is_none());
    assert_eq!(report.supporter.normalized_phone.as_deref(), Some("6715550100"));
    assert_eq!(
        report.supporter.verification_status,
        VerificationStatus::Verified
    );
}

#[test]
fn update_that_moves_jurisdiction_is_re_vetted() {
    let (service, _, _) = build_service(juan_cruz_roll(), &ReconciliationConfig::default());
    let created = service
        .create(with_dob(submission("Juan", "Cruz", Some(BARRIGADA)), 1985, 3, 15))
        .expect("create succeeds");

    let report = service
        .update(
            created.supporter.id,
            with_dob(submission("Juan", "Cruz", Some(DEDEDO)), 1985, 3, 15),
        )
        .expect("update succeeds");

    assert_eq!(
        report.vetting.expect("re-vetted").outcome,
        VettingOutcome::Referral
    );
    assert_eq!(
        report.supporter.verification_status,
        VerificationStatus::Flagged
    );
    assert_eq!(report.supporter.referred_from_jurisdiction_id, Some(BARRIGADA));
}

#[test]
fn missing_records_surface_not_found() {
    let (service, _, _) = build_service(juan_cruz_roll(), &ReconciliationConfig::default());

    match service.get(SupporterId(404)) {
        Err(SupporterServiceError::Repository(RepositoryError::NotFound)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(matches!(
        service.update(SupporterId(404), submission("Juan", "Cruz", None)),
        Err(SupporterServiceError::Repository(RepositoryError::NotFound))
    ));
}

#[test]
fn repository_outage_propagates() {
    let config = ReconciliationConfig::default();
    let service = SupporterService::new(
        Arc::new(Matcher::new(juan_cruz_roll(), config.clone())),
        directory(),
        Arc::new(UnavailableRepository),
        Arc::new(InMemoryReviewQueue::new()),
        &config,
    );

    assert!(matches!(
        service.create(submission("Juan", "Cruz", Some(BARRIGADA))),
        Err(SupporterServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
}

#[test]
fn bulk_revet_walks_every_chunk_of_the_filter() {
    let config = ReconciliationConfig {
        revet_chunk_size: 2,
        ..ReconciliationConfig::default()
    };
    // Supporters are created before the roll exists, so every create is skipped.
    let store = roll("");
    let (service, repository, _) = build_service(store.clone(), &config);
    for (first, last, jurisdiction) in [
        ("Juan", "Cruz", BARRIGADA),
        ("Ana", "Santos", BARRIGADA),
        ("Pedro", "Reyes", YIGO),
    ] {
        let mut submission = with_dob(submission(first, last, Some(jurisdiction)), 1985, 3, 15);
        if first == "Ana" {
            submission.dob = None;
            submission.birth_year = Some(1990);
        }
        service.create(submission).expect("create succeeds");
    }

    crate::workflows::roll::ImportProcessor::new(store, directory(), config.clone())
        .import_reader(
            crate::workflows::roll::ImportRequest {
                list_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date"),
                source_filename: None,
            },
            std::io::Cursor::new(
                "first_name,last_name,dob,jurisdiction_name\n\
                 Juan,Cruz,1985-03-15,Barrigada\n\
                 Ana,Santos,1990-05-20,Dededo\n",
            ),
        )
        .expect("roll import");

    let summary = service
        .revet(&SupporterFilter::unverified(), &StopSignal::new())
        .expect("revet succeeds");

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.auto_verified, 1);
    assert_eq!(summary.referral, 1);
    assert_eq!(summary.unregistered, 1);
    assert_eq!(summary.vetted(), 3);
    assert!(!summary.stopped);

    let verified = repository
        .find(
            &SupporterFilter {
                verification_status: Some(VerificationStatus::Verified),
                ..SupporterFilter::default()
            },
            None,
            10,
        )
        .expect("query succeeds");
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].first_name, "Juan");
}

#[test]
fn stopped_revet_processes_nothing() {
    let (service, _, _) = build_service(juan_cruz_roll(), &ReconciliationConfig::default());
    service
        .create(submission("Juan", "Cruz", Some(BARRIGADA)))
        .expect("create succeeds");

    let stop = StopSignal::new();
    stop.stop();
    let summary = service
        .revet(&SupporterFilter::default(), &stop)
        .expect("revet returns");
    assert!(summary.stopped);
    assert_eq!(summary.processed, 0);
}
