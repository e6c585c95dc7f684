//! Periodic low-stock report generation.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use stockledger_core::{LedgerError, LedgerResult, ReportId, TenantContext, TenantId};
use stockledger_inventory::LowStockReport;

use crate::config::LowStockConfig;
use crate::store::{CommitHooks, EntityKind, LedgerStore, RecordKey, UnitOfWork};

/// Writes one [`LowStockReport`] per tenant on a fixed interval.
///
/// Reports are written by the system actor through a unit of work, so they
/// are tenant-stamped and audited like any other row.
pub struct LowStockReportJob<S> {
    store: S,
    hooks: Arc<CommitHooks>,
    config: LowStockConfig,
}

impl<S> LowStockReportJob<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, config: LowStockConfig) -> Self {
        Self {
            store,
            hooks: Arc::new(CommitHooks::standard()),
            config,
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn generate_for_tenant(&self, tenant_id: TenantId) -> LedgerResult<LowStockReport> {
        let tenant = TenantContext::resolved(tenant_id);
        let listing = self.store.list_stock(tenant.require()?).await?;

        let mut uow = UnitOfWork::begin(&self.store, self.hooks.clone(), tenant, None).await?;
        let id = ReportId::new(uow.allocate_id(EntityKind::LowStockReport).await?);
        uow.stage_insert(LowStockReport::from_listing(
            id,
            self.config.threshold,
            Utc::now(),
            listing,
        ))?;

        let receipt = uow.commit().await?;
        let report: LowStockReport = receipt
            .get(&RecordKey::new(EntityKind::LowStockReport, id.get()))
            .ok_or_else(|| LedgerError::store("committed report missing from receipt"))?;

        info!(
            report_id = %report.id,
            rows = report.rows.len(),
            threshold = %report.threshold,
            "low-stock report generated"
        );
        Ok(report)
    }

    /// One report for every tenant the store knows about.
    ///
    /// A failing tenant is logged and skipped; the others still get their
    /// report.
    pub async fn generate_for_all_tenants(&self) -> LedgerResult<Vec<LowStockReport>> {
        let tenants = self.store.tenants().await?;
        let mut reports = Vec::with_capacity(tenants.len());
        for tenant_id in tenants {
            match self.generate_for_tenant(tenant_id).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(tenant_id = %tenant_id, error = %err, "low-stock report failed");
                }
            }
        }
        Ok(reports)
    }

    /// Generate reports until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            threshold = %self.config.threshold,
            "low-stock report job started"
        );

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.config.initial_delay) => {}
        }

        loop {
            if let Err(err) = self.generate_for_all_tenants().await {
                error!(error = %err, "low-stock report run failed");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        info!("low-stock report job stopped");
    }
}
