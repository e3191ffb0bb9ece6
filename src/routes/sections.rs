use axum::Json;
use serde::Serialize;

use crate::domain::Section;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCatalogEntry {
    pub section: Section,
    pub sub_sections: &'static [&'static str],
}

pub async fn list_sections() -> Json<Vec<SectionCatalogEntry>> {
    Json(
        Section::ALL
            .into_iter()
            .map(|section| SectionCatalogEntry {
                section,
                sub_sections: section.sub_sections(),
            })
            .collect(),
    )
}
