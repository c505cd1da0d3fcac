//! 行程单据：元信息挂在行程上，内容按块单独存放
//!
//! Durable Object 单个值有大小上限，data URL 切成若干块写入
//! `doc:{trip}:{type}:{version}:{index}`，读取时按序拼回。

use super::adapter::{Clock, StorageAdapter};
use super::trips::require_owner_or_admin;
use super::{Marketplace, keys};
use crate::error::{MarketError, MarketResult};
use tripfin_shared::protocol::UploadDocumentRequest;
use tripfin_shared::{
    DocumentContent, DocumentType, MAX_DOCUMENT_BYTES, TripDocument, TripStatus, User,
    data_url_mime,
};

/// 单块字节数，低于 128 KiB 的单值上限
pub const DOCUMENT_CHUNK_BYTES: usize = 96 * 1024;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// 按字节切块，切点退到字符边界
fn split_chunks(data: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let mut cut = rest.len().min(max);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    pub async fn upload_document(
        &self,
        actor: &User,
        req: UploadDocumentRequest,
    ) -> MarketResult<TripDocument> {
        let mut trip = self.load_trip(&req.trip_id).await?;
        require_owner_or_admin(actor, &trip)?;
        if trip.status == TripStatus::Cancelled {
            return Err(MarketError::conflict("Cannot upload documents to a cancelled trip"));
        }
        let data = req.document_data.trim();
        if data.is_empty() {
            return Err(MarketError::invalid_input("Document data is required"));
        }
        if data.len() > MAX_DOCUMENT_BYTES {
            return Err(MarketError::invalid_input(format!(
                "Document is too large ({} KiB, limit {} KiB)",
                data.len().div_ceil(1024),
                MAX_DOCUMENT_BYTES / 1024
            )));
        }

        let kind = req.document_type.as_str();
        let version = self.next_seq("doc").await?;
        let chunks = split_chunks(data, DOCUMENT_CHUNK_BYTES);
        for (index, chunk) in chunks.iter().enumerate() {
            let key = keys::document_chunk(&trip.id, kind, version, index);
            self.storage.put(&key, chunk).await?;
        }

        let doc = TripDocument {
            document_type: req.document_type,
            content_type: data_url_mime(data)
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string(),
            size: data.len(),
            version,
            chunks: chunks.len(),
            uploaded_by: actor.id.clone(),
            uploaded_at: self.now(),
        };
        let previous = trip.document(req.document_type).cloned();
        trip.put_document(doc.clone());
        self.save_trip(&trip).await?;

        // 新元信息落盘后再删旧内容
        if let Some(old) = previous {
            self.delete_document_content(&trip.id, &old).await?;
        }
        log_info!(
            "[documents] trip={} type={} v{} {} bytes in {} chunk(s)",
            trip.id,
            kind,
            version,
            doc.size,
            doc.chunks
        );
        Ok(doc)
    }

    /// 行程所有者、放款方与管理员可以读取
    pub async fn get_document(
        &self,
        actor: &User,
        trip_id: &str,
        kind: DocumentType,
    ) -> MarketResult<DocumentContent> {
        let trip = self.load_trip(trip_id).await?;
        let is_lender = trip.lender_id.as_deref() == Some(actor.id.as_str());
        if !is_lender {
            require_owner_or_admin(actor, &trip)
                .map_err(|_| MarketError::forbidden("You cannot view this trip's documents"))?;
        }
        let doc = trip
            .document(kind)
            .filter(|d| d.chunks > 0)
            .ok_or_else(|| MarketError::not_found(format!("{} not uploaded", kind.label())))?;

        let prefix = keys::document_chunks(&trip.id, kind.as_str(), doc.version);
        let parts: Vec<(String, String)> = self.storage.list(&prefix).await?;
        if parts.len() != doc.chunks {
            return Err(MarketError::store(format!(
                "Document {} v{} has {} of {} chunks",
                kind.as_str(),
                doc.version,
                parts.len(),
                doc.chunks
            )));
        }
        let document_data: String = parts.into_iter().map(|(_, part)| part).collect();

        Ok(DocumentContent {
            document_type: kind,
            content_type: doc.content_type.clone(),
            document_data,
            uploaded_at: doc.uploaded_at,
        })
    }

    pub(super) async fn delete_document_content(
        &self,
        trip_id: &str,
        doc: &TripDocument,
    ) -> MarketResult<()> {
        for index in 0..doc.chunks {
            let key = keys::document_chunk(trip_id, doc.document_type.as_str(), doc.version, index);
            self.storage.delete(&key).await?;
        }
        Ok(())
    }
}
