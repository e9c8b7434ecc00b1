use super::*;

fn parse_args(argv: &[&str]) -> Args {
    Args::try_parse_from(argv)
        .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
}

#[test]
fn words_form_one_initial_message() {
    let args = parse_args(&["azc", "what", "is", "rust?"]);
    assert_eq!(args.initial_message().as_deref(), Some("what is rust?"));
    assert!(!args.multiline);
}

#[test]
fn no_words_means_no_initial_message() {
    let args = parse_args(&["azc", "--multiline"]);
    assert_eq!(args.initial_message(), None);
    assert!(args.multiline);
}

#[test]
fn provider_and_model_flags() {
    let args = parse_args(&["azc", "-p", "anth", "--model", "haiku", "hello"]);
    assert_eq!(args.provider.as_deref(), Some("anth"));
    assert_eq!(args.model.as_deref(), Some("haiku"));
    assert_eq!(args.words, vec!["hello"]);
}

#[test]
fn path_flags_are_parsed() {
    let args = parse_args(&[
        "azc",
        "--config",
        "/tmp/c.json",
        "--cache",
        "/tmp/m.json",
        "--history",
        "/tmp/h.txt",
        "-l",
        "/tmp/azc.log",
    ]);
    assert_eq!(args.config, Some(PathBuf::from("/tmp/c.json")));
    assert_eq!(args.cache, Some(PathBuf::from("/tmp/m.json")));
    assert_eq!(args.history, Some(PathBuf::from("/tmp/h.txt")));
    assert_eq!(args.log, Some(PathBuf::from("/tmp/azc.log")));
}

#[test]
fn default_primer_leaves_room_for_the_prompt() {
    assert_eq!(
        default_primer(24),
        "please limit your response to 20 lines at most"
    );
    assert_eq!(default_primer(3), "please limit your response to 1 lines at most");
}

#[test]
fn primer_flags() {
    let args = parse_args(&["azc"]);
    assert_eq!(args.primer(30), Some(default_primer(30)));

    let args = parse_args(&["azc", "--primer", "answer in French"]);
    assert_eq!(args.primer(30).as_deref(), Some("answer in French"));

    let args = parse_args(&["azc", "--no-primer"]);
    assert_eq!(args.primer(30), None);
}

#[test]
fn primer_and_no_primer_conflict() {
    assert!(Args::try_parse_from(["azc", "--primer", "x", "--no-primer"]).is_err());
}

#[test]
fn missing_backends_message_names_every_variable() {
    let message = missing_backends_message();
    for kind in BackendKind::ALL {
        assert!(message.contains(kind.credential_var()), "{kind} missing");
    }
}
