//! Quality fallback: pick the resource id to hand to the downloader.

use thiserror::Error;

use super::types::{QualityVariant, ResourceId, Track};
use crate::types::QualityPreference;

/// Named quality variant fields of a [`Track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    HMusic,
    BMusic,
    MMusic,
    LMusic,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HMusic => "hMusic",
            Self::BMusic => "bMusic",
            Self::MMusic => "mMusic",
            Self::LMusic => "lMusic",
        }
    }

    fn of<'a>(&self, track: &'a Track) -> Option<&'a QualityVariant> {
        let field = match self {
            Self::HMusic => &track.h_music,
            Self::BMusic => &track.b_music,
            Self::MMusic => &track.m_music,
            Self::LMusic => &track.l_music,
        };
        field.as_ref().and_then(Option::as_ref)
    }
}

impl QualityPreference {
    /// Variants to try, best first.
    pub fn order(&self) -> &'static [VariantKind] {
        use VariantKind::*;
        match self {
            QualityPreference::High => &[HMusic, BMusic, MMusic, LMusic],
            QualityPreference::Balanced => &[MMusic, HMusic, BMusic, LMusic],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no resource available for track {0}")]
pub struct NoResourceAvailable(pub u64);

/// Return the first non-null `dfsId` among `order`.
///
/// Variants outside `order` are never consulted.
pub fn select_resource_id(
    track: &Track,
    order: &[VariantKind],
) -> Result<ResourceId, NoResourceAvailable> {
    for kind in order {
        if let Some(id) = kind.of(track).and_then(QualityVariant::resource_id) {
            tracing::debug!(
                track = %track.id,
                variant = kind.as_str(),
                resource = %id,
                "Selected resource"
            );
            return Ok(id);
        }
    }
    Err(NoResourceAvailable(track.id.0))
}
