use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;


lazy_static! {
    pub static ref OPS_APPENDED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("ops_appended", "Operations durably appended to a document log"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref TAIL_EVICTIONS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("tail_evictions", "Tails ended by the store rather than by their consumer"),
        &["name", "reason"]
    )
    .expect("metric can not be created");

    pub static ref LOG_STORES_CLOSED_METRIC: IntCounter =
        IntCounter::new("log_stores_closed", "Log stores closed by idle timeout or shutdown")
            .expect("metric can not be created");

    pub static ref ACTIVE_TAILS_METRIC: IntGauge =
        IntGauge::new("active_tails", "Follow reads currently attached to a log store")
            .expect("metric can not be created");
}

/// Registers every collector of this crate into `registry`.
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(OPS_APPENDED_METRIC.clone()))?;
    registry.register(Box::new(TAIL_EVICTIONS_METRIC.clone()))?;
    registry.register(Box::new(LOG_STORES_CLOSED_METRIC.clone()))?;
    registry.register(Box::new(ACTIVE_TAILS_METRIC.clone()))?;
    Ok(())
}
