// web-server/src/sweeper.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, ResponseFuture};
use actix_web::web;
use sneradar_common::store::{StoreError, SweepReport};
use sneradar_common::AuthService;
use std::time::Duration;

/// Actor message: sweep expired records now.
#[derive(Message)]
#[rtype(result = "Result<SweepReport, StoreError>")]
pub struct SweepNow;

/// Periodically reclaims expired nonces, codes and sessions. Expiry is
/// already enforced on every read, so this only bounds memory.
pub struct StoreSweeper {
    service: web::Data<AuthService>,
    interval: Duration,
}

impl StoreSweeper {
    pub fn new(service: web::Data<AuthService>, interval: Duration) -> Self {
        Self { service, interval }
    }
}

impl Actor for StoreSweeper {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Store sweeper started, interval {:?}", self.interval);

        ctx.run_interval(self.interval, |act, _ctx| {
            let service = act.service.clone();
            actix::spawn(async move {
                match service.sweep().await {
                    Ok(report) if report.total() > 0 => tracing::info!(
                        "Swept {} nonces, {} codes, {} sessions",
                        report.nonces,
                        report.codes,
                        report.sessions
                    ),
                    Ok(_) => tracing::debug!("Sweep found nothing to reclaim"),
                    Err(e) => tracing::error!("Store sweep failed: {}", e),
                }
            });
        });
    }
}

impl Handler<SweepNow> for StoreSweeper {
    type Result = ResponseFuture<Result<SweepReport, StoreError>>;

    fn handle(&mut self, _msg: SweepNow, _ctx: &mut Self::Context) -> Self::Result {
        let service = self.service.clone();
        Box::pin(async move { service.sweep().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sneradar_common::{AuthConfig, FlowContext, ManualClock, MemoryStore};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_sweep_now_reclaims_expired_nonces() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let service = web::Data::new(AuthService::new(
            &AuthConfig::default(),
            store.clone(),
            clock.clone(),
        ));
        service
            .issue_nonce("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed", FlowContext::Web)
            .await
            .unwrap();

        let sweeper = StoreSweeper::new(service, Duration::from_secs(3600)).start();
        let report = sweeper.send(SweepNow).await.unwrap().unwrap();
        assert_eq!(report.total(), 0);

        clock.advance(chrono::Duration::seconds(601));
        let report = sweeper.send(SweepNow).await.unwrap().unwrap();
        assert_eq!(report.nonces, 1);
        assert_eq!(store.nonce_count(), 0);
    }
}
