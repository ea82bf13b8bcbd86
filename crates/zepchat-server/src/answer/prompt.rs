use crate::zep::ZepDocument;

const INSTRUCTIONS: &str = "You are a helpful assistant answering questions about fever care. \
Answer using only the reference material below. If the material does not contain the answer, \
say that you don't know instead of guessing.";

const NO_MATERIAL: &str = "No reference material matched this question closely enough. \
Tell the user you don't know the answer.";

/// System prompt embedding the retrieved documents as reference material.
pub fn build_system_prompt(documents: &[ZepDocument]) -> String {
    if documents.is_empty() {
        return format!("{INSTRUCTIONS}\n\n{NO_MATERIAL}");
    }

    let material = documents
        .iter()
        .map(|doc| doc.content.trim())
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!("{INSTRUCTIONS}\n\nReference material:\n---\n{material}\n---")
}
