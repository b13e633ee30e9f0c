use pretty_assertions::assert_eq;
use tunegrab_core::ItemDescriptor;
use tunegrab_engine::{assign_stems, sanitize_title};

#[test]
fn forbidden_characters_are_replaced() {
    assert_eq!(sanitize_title("My: Title?/Bad"), "My_ Title_Bad");
    assert_eq!(sanitize_title("a//b"), "a_b");
}

#[test]
fn plain_titles_are_kept() {
    assert_eq!(sanitize_title("Song Title"), "Song Title");
}

#[test]
fn empty_and_reserved_names_are_patched() {
    assert_eq!(sanitize_title("???"), "untitled");
    assert_eq!(sanitize_title("CON"), "CON_");
}

#[test]
fn long_titles_are_capped() {
    let long = "x".repeat(500);
    assert_eq!(sanitize_title(&long).chars().count(), 120);
}

#[test]
fn unique_titles_keep_plain_stems() {
    let entries = vec![
        ItemDescriptor::new("u1", "One", "1"),
        ItemDescriptor::new("u2", "Two", "2"),
    ];
    assert_eq!(assign_stems(&entries), vec!["One", "Two"]);
}

#[test]
fn colliding_titles_get_their_id_appended() {
    let entries = vec![
        ItemDescriptor::new("u1", "Intro", "a"),
        ItemDescriptor::new("u2", "Outro", "b"),
        ItemDescriptor::new("u3", "INTRO", "c"),
    ];
    assert_eq!(
        assign_stems(&entries),
        vec!["Intro [a]", "Outro", "INTRO [c]"]
    );
}
