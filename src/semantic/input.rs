//! Builds the text that gets embedded for a post.
//!
//! The input is title, body and author joined by single spaces, in that
//! order. This layout is contractual: stored embeddings were produced from
//! it, so changing the order or separator makes every stored vector
//! incomparable with newly generated ones.

/// Concatenate a post's text fields into the embedding input.
///
/// A missing author contributes an empty string, which leaves a trailing
/// space. Deliberate: it keeps the input byte-identical with what earlier
/// syncs embedded.
pub fn embedding_input(title: &str, content: &str, author: Option<&str>) -> String {
    format!("{} {} {}", title, content, author.unwrap_or(""))
}
