use marktask::output::{format_human, HumanOutput};

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("marktask mv: TODO -> DOING \"write docs\"");
    human.push_summary("order", "25");
    human.push_detail("wrote notes.md");
    human.push_warning("notes.md changed on disk");
    human.push_next_step("marktask show notes.md:3");

    let rendered = format_human(&human);
    assert!(rendered.starts_with("marktask mv: TODO -> DOING"));
    assert!(rendered.contains("Summary:\n- order: 25"));
    assert!(rendered.contains("Details:\n- wrote notes.md"));
    assert!(rendered.contains("Warnings:\n- notes.md changed on disk"));
    assert!(rendered.contains("Next steps:\n- marktask show notes.md:3"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("marktask check: ok");
    assert_eq!(format_human(&human), "marktask check: ok");
}
