use tsd::{parse, parse_program, ProgramState, ResourceLimits, TsdError};

#[test]
fn test_empty_string_parses_to_empty_program() {
    let (program, errors) = parse_program("", "test.tsd", &ResourceLimits::default()).unwrap();
    assert!(program.is_empty());
    assert!(errors.is_empty());
}

#[test]
fn test_whitespace_only() {
    let raw = parse("   \n\t  \r\n", "test.tsd", &ResourceLimits::default()).unwrap();
    assert!(raw["statements"].as_array().unwrap().is_empty());
}

#[test]
fn test_comments_only() {
    let mut state = ProgramState::new();
    state
        .parse_and_merge_content("// nothing here\n/* or here */\n", "test.tsd")
        .unwrap();
    assert!(!state.has_errors());
    assert_eq!(state.get_files_parsed(), vec!["test.tsd"]);
    assert!(state.to_program().is_empty());
}

#[test]
fn test_empty_content_is_an_argument_error() {
    let mut state = ProgramState::new();
    let result = state.parse_and_merge_content("", "test.tsd");
    assert!(matches!(result, Err(TsdError::Argument(_))));
    assert!(state.get_files_parsed().is_empty());
}

#[test]
fn test_empty_file_on_disk_is_parsed() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut state = ProgramState::new();
    state.parse_and_merge(file.path()).unwrap();
    assert_eq!(state.get_files_parsed().len(), 1);
    assert!(!state.has_errors());
}

#[test]
fn test_reset_only() {
    let mut state = ProgramState::new();
    state.parse_and_merge_content("reset\n", "test.tsd").unwrap();
    assert!(!state.has_errors());
    assert!(state.to_program().is_empty());
}
