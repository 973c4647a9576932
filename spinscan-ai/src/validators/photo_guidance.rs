//! Photo guidance table
//!
//! Static mapping from a missing field to the photo most likely to reveal it.

use crate::types::{Field, PhotoGuidance, PhotoKind};

/// Guidance for one missing field
pub fn guidance_for(field: Field) -> PhotoGuidance {
    let (photo, instruction) = match field {
        Field::Artist | Field::Title => (
            PhotoKind::FrontCover,
            "photograph the front cover with the artist name and title in frame",
        ),
        Field::CatalogNumber | Field::MatrixNumber => {
            (PhotoKind::Label, "photograph the label or runout groove area")
        }
        Field::Barcode => (PhotoKind::BackCover, "photograph the back cover barcode area"),
        Field::Label => (PhotoKind::Label, "photograph the record label"),
        Field::Year | Field::Country => (
            PhotoKind::BackCover,
            "photograph the back cover small print",
        ),
        Field::Format => (PhotoKind::FrontCover, "photograph the front of the item"),
    };

    PhotoGuidance {
        field,
        photo,
        instruction: instruction.to_string(),
    }
}

/// One guidance entry per missing field, in the given order
pub fn guidance_for_all(missing: &[Field]) -> Vec<PhotoGuidance> {
    missing.iter().map(|f| guidance_for(*f)).collect()
}
