use crate::domain::entities::DomainRecord;
use crate::domain::value_objects::Collection;
use crate::shared::AppError;
use async_trait::async_trait;

/// 書き込み確定後に発火する副作用（未読数の加算、既読化など）。
///
/// 失敗しても確定済みのレコードは巻き戻さない。
#[async_trait]
pub trait ActivityNotifier: Send + Sync {
    async fn record_activity(
        &self,
        collection: &Collection,
        record: &DomainRecord,
    ) -> Result<(), AppError>;
}
