//! Word inflection for link titles and counter labels.

use convert_case::{Case, Casing};

/// `created_at` → `Created At`.
pub fn humanize(word: &str) -> String {
    word.to_case(Case::Title)
}

/// `BlogPosts` → `blog_posts`.
pub fn underscore(word: &str) -> String {
    word.to_case(Case::Snake)
}

/// Default sort-link title for a field key such as `Articles.author_id`.
pub fn sort_title(key: &str) -> String {
    let spaced = key.replace('.', " ");
    let trimmed = spaced.strip_suffix("_id").unwrap_or(&spaced);
    humanize(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_words() {
        assert_eq!(humanize("created_at"), "Created At");
        assert_eq!(humanize("title"), "Title");
    }

    #[test]
    fn underscore_camel_case() {
        assert_eq!(underscore("BlogPosts"), "blog_posts");
        assert_eq!(underscore("Articles"), "articles");
        assert_eq!(underscore("blog posts"), "blog_posts");
    }

    #[test]
    fn sort_title_strips_id_and_alias_dot() {
        assert_eq!(sort_title("author_id"), "Author");
        assert_eq!(sort_title("Articles.title"), "Articles Title");
    }
}
