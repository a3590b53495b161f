use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use voter_vetting::config::ReconciliationConfig;
use voter_vetting::workflows::matching::Matcher;
use voter_vetting::workflows::roll::{
    ImportProcessor, InMemoryRollStore, RollApi, StaticJurisdictions,
};
use voter_vetting::workflows::supporters::{
    InMemoryReviewQueue, InMemorySupporterRepository, PostImportRevet, SupporterApi,
    SupporterService,
};
use voter_vetting::workflows::StopSignal;

pub(crate) const GUAM_VILLAGES: [&str; 19] = [
    "Agana Heights",
    "Agat",
    "Asan-Maina",
    "Barrigada",
    "Chalan Pago-Ordot",
    "Dededo",
    "Hagatna",
    "Inarajan",
    "Mangilao",
    "Merizo",
    "Mongmong-Toto-Maite",
    "Piti",
    "Santa Rita",
    "Sinajana",
    "Talofofo",
    "Tamuning",
    "Umatac",
    "Yigo",
    "Yona",
];

pub(crate) type SupporterEngine =
    SupporterService<InMemoryRollStore, InMemorySupporterRepository, InMemoryReviewQueue>;
pub(crate) type SupporterEndpoints =
    SupporterApi<InMemoryRollStore, InMemorySupporterRepository, InMemoryReviewQueue>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) review: Arc<InMemoryReviewQueue>,
}

/// Everything the HTTP surface and the CLI need, wired over in-memory stores.
pub(crate) struct Engine {
    pub(crate) roll: Arc<RollApi<InMemoryRollStore>>,
    pub(crate) supporters: Arc<SupporterEndpoints>,
    pub(crate) review: Arc<InMemoryReviewQueue>,
    pub(crate) stop: StopSignal,
}

pub(crate) fn guam_villages() -> StaticJurisdictions {
    StaticJurisdictions::from_names(&GUAM_VILLAGES)
}

pub(crate) fn build_engine(config: &ReconciliationConfig) -> Engine {
    let directory = Arc::new(guam_villages());
    let store = Arc::new(InMemoryRollStore::new());
    let review = Arc::new(InMemoryReviewQueue::new());
    let stop = StopSignal::new();

    let service: Arc<SupporterEngine> = Arc::new(SupporterService::new(
        Arc::new(Matcher::new(store.clone(), config.clone())),
        directory.clone(),
        Arc::new(InMemorySupporterRepository::new()),
        review.clone(),
        config,
    ));

    let importer = ImportProcessor::new(store.clone(), directory, config.clone())
        .with_revet_hook(Arc::new(PostImportRevet::new(service.clone(), stop.clone())));

    Engine {
        roll: Arc::new(RollApi {
            importer,
            matcher: Matcher::new(store, config.clone()),
        }),
        supporters: Arc::new(SupporterApi {
            service,
            stop: stop.clone(),
        }),
        review,
        stop,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voter_vetting::workflows::roll::{JurisdictionDirectory, JurisdictionId};

    #[test]
    fn villages_resolve_case_insensitively() {
        let directory = guam_villages();
        assert_eq!(directory.resolve("barrigada"), Some(JurisdictionId(4)));
        assert_eq!(directory.resolve("  YIGO "), Some(JurisdictionId(18)));
        assert_eq!(directory.name_of(JurisdictionId(6)).as_deref(), Some("Dededo"));
        assert_eq!(directory.resolve("Saipan"), None);
    }

    #[test]
    fn parse_date_requires_iso_format() {
        assert_eq!(
            parse_date(" 2024-03-01 "),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"))
        );
        assert!(parse_date("03/01/2024").is_err());
    }
}
