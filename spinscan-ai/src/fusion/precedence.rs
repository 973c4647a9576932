//! Photo-kind precedence table
//!
//! For each field, which photo kinds are most authoritative. Used only to
//! break exact confidence ties during fusion.

use crate::types::{Field, PhotoKind};

/// Photo kinds for `field`, most authoritative first
pub fn precedence(field: Field) -> &'static [PhotoKind] {
    use PhotoKind::*;

    match field {
        Field::Artist | Field::Title => &[FrontCover, Spine, BackCover, Label],
        Field::Label => &[Label, BackCover, Spine, FrontCover],
        Field::CatalogNumber => &[Label, Runout, Spine, BackCover],
        Field::MatrixNumber => &[Runout, Label],
        Field::Barcode => &[Barcode, BackCover],
        Field::Country => &[BackCover, Label],
        Field::Year => &[Label, BackCover],
        Field::Format => &[Label, FrontCover, BackCover],
    }
}

/// Authority rank of `kind` for `field` (lower is more authoritative)
///
/// Listed kinds rank by position, unlisted kinds after them, `unknown` last.
pub fn authority_rank(field: Field, kind: PhotoKind) -> usize {
    let table = precedence(field);
    match table.iter().position(|k| *k == kind) {
        Some(pos) => pos,
        None if kind == PhotoKind::Unknown => table.len() + 1,
        None => table.len(),
    }
}
