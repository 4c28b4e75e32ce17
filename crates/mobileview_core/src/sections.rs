use tracing::debug;

use crate::heading::strip_markup;
use crate::model::NormalizedSection;
use crate::raw::RawSection;

/// Group a flat, level-tagged section list into its top-level sections.
///
/// The top level is the shallowest level present. Every deeper section is folded
/// into the preceding top-level section's `text` behind a synthesized heading that
/// uses its own level number. Sections without a level (the lead) are ignored.
pub fn flatten_sections(sections: &[RawSection]) -> Vec<NormalizedSection> {
    let Some(top_level) = shallowest_level(sections) else {
        return Vec::new();
    };

    let mut output = Vec::<NormalizedSection>::new();
    let mut orphaned = 0usize;
    for section in sections {
        let Some(level) = section.level.as_deref() else {
            continue;
        };
        if parse_level(level) == Some(top_level) {
            output.push(NormalizedSection {
                id: section.id,
                level: level.to_string(),
                line: strip_markup(&section.line),
                anchor: section.anchor.clone(),
                text: section.text.clone(),
                references: section.references.clone(),
            });
            continue;
        }
        match output.last_mut() {
            Some(current) => append_subsection(&mut current.text, level, section),
            None => orphaned += 1,
        }
    }

    if orphaned > 0 {
        debug!(orphaned, "dropped subsections preceding the first top-level section");
    }
    output
}

/// Smallest positive numeric level among levelled sections.
pub fn shallowest_level(sections: &[RawSection]) -> Option<u32> {
    sections
        .iter()
        .filter_map(|section| section.level.as_deref())
        .filter_map(parse_level)
        .min()
}

fn parse_level(level: &str) -> Option<u32> {
    level.trim().parse::<u32>().ok().filter(|value| *value > 0)
}

fn append_subsection(text: &mut String, level: &str, section: &RawSection) {
    text.push_str(&format!(
        "<h{level} id=\"{}\">{}</h{level}>",
        section.anchor, section.line
    ));
    text.push_str(&section.text);
}
