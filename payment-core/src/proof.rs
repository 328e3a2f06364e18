//! Proof-of-payment documents attached to bank transfers
//!
//! Type and size checks here are advisory; the backend has to repeat them.

use crate::error::{Result, ValidationError};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Largest accepted upload (5 MiB)
pub const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

/// Accepted document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProofContentType {
    Pdf,
    Png,
    Jpeg,
}

impl ProofContentType {
    /// Content type from a file name's extension (case-insensitive)
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .ok_or_else(|| ValidationError::UnsupportedProofType(file_name.to_string()))?;

        match extension.as_str() {
            "pdf" => Ok(ProofContentType::Pdf),
            "png" => Ok(ProofContentType::Png),
            "jpg" | "jpeg" => Ok(ProofContentType::Jpeg),
            other => Err(ValidationError::UnsupportedProofType(other.to_string())),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ProofContentType::Pdf => "application/pdf",
            ProofContentType::Png => "image/png",
            ProofContentType::Jpeg => "image/jpeg",
        }
    }
}

/// An uploaded proof document that passed the type and size checks
#[derive(Clone, PartialEq, Eq)]
pub struct ProofDocument {
    file_name: String,
    content_type: ProofContentType,
    content: Bytes,
}

impl ProofDocument {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Result<Self> {
        Self::with_limit(file_name, content, MAX_PROOF_BYTES)
    }

    /// Same as [`ProofDocument::new`] with a caller-supplied size limit
    pub fn with_limit(
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
        max_bytes: usize,
    ) -> Result<Self> {
        let file_name = file_name.into();
        let content = content.into();
        let content_type = ProofContentType::from_file_name(&file_name)?;

        if content.len() > max_bytes {
            return Err(ValidationError::ProofTooLarge {
                size: content.len(),
                max: max_bytes,
            });
        }

        Ok(Self {
            file_name,
            content_type,
            content,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> ProofContentType {
        self.content_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for ProofDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofDocument")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}
