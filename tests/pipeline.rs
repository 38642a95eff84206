use bibtidy::options::{DuplicateRule, MergeStrategy, Toggle};
use bibtidy::{Error, TidyOptions, WarningCode, parse, tidy};

const SAMPLE: &str = r#"% Generated by hand
@String{acm = "ACM"}

@Article{smith2020,
  author    = {Smith, John and M{\"u}ller, Hans},
  title     = "A Study of {BibTeX}",
  journal   = acm,
  year      = {2020},
  month     = jan,
}

stray text with an e-mail: me@example.org

@inproceedings(jones2019, title={Other}, year=2019, booktitle={Proc. # 1})
@comment{ keep me }
@misc{broken, title {no equals}}
"#;

fn keys(bibtex: &str) -> Vec<String> {
    let (doc, _) = parse(bibtex);
    doc.entries()
        .map(|(_, entry)| entry.key.clone().unwrap_or_default())
        .collect()
}

fn field_names(bibtex: &str) -> Vec<Vec<String>> {
    let (doc, _) = parse(bibtex);
    doc.entries()
        .map(|(_, entry)| entry.fields.iter().map(|f| f.name.clone()).collect())
        .collect()
}

#[test]
fn test_roundtrip_without_options() {
    let result = tidy(SAMPLE, &TidyOptions::default());
    assert_eq!(result.bibtex, SAMPLE);
    assert_eq!(result.count, 2);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, WarningCode::MalformedBlock);
}

#[test]
fn test_recommended_is_idempotent() {
    let options = TidyOptions::recommended();
    let once = tidy(SAMPLE, &options).bibtex;
    let twice = tidy(&once, &options).bibtex;
    assert_eq!(once, twice);
    assert!(once.contains("@article{smith2020,\n"));
    assert!(once.contains("  title          = \"A Study of {BibTeX}\",\n"));
}

#[test]
fn test_idempotent_with_structural_options() {
    let options = TidyOptions {
        curly: true,
        numeric: true,
        sort: Some(Toggle::Value(vec!["-year".into()])),
        sort_fields: Some(Toggle::Flag(true)),
        duplicates: Some(Toggle::Value(vec![DuplicateRule::Key])),
        merge: Some(Toggle::Value(MergeStrategy::Combine)),
        strip_comments: true,
        wrap: Some(Toggle::Value(40)),
        trailing_commas: true,
        ..TidyOptions::recommended()
    };
    let once = tidy(SAMPLE, &options).bibtex;
    assert_eq!(tidy(&once, &options).bibtex, once);
    assert_eq!(keys(&once), vec!["smith2020", "jones2019"]);
    assert!(!once.contains("keep me"));
}

#[test]
fn test_sort_is_stable_over_keys() {
    let input = "@misc{B, year = 2020}\n@misc{A, year = 2020}\n@misc{C, year = 2019}\n";
    let options = TidyOptions {
        sort: Some(Toggle::Value(vec!["year".into(), "key".into()])),
        ..TidyOptions::default()
    };
    let result = tidy(input, &options);
    assert_eq!(keys(&result.bibtex), vec!["C", "A", "B"]);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_combine_merge() {
    let input = "@article{A, title = {X}, year = 2000}\n@article{B, title = {X}, doi = {10.1/x}}\n";
    let options = TidyOptions {
        merge: Some(Toggle::Value(MergeStrategy::Combine)),
        ..TidyOptions::default()
    };
    let result = tidy(input, &options);
    assert_eq!(keys(&result.bibtex), vec!["A"]);
    assert_eq!(field_names(&result.bibtex), vec![vec!["title", "year", "doi"]]);
    assert_eq!(result.count, 2);

    let duplicate = &result.warnings[0];
    assert_eq!(duplicate.code, WarningCode::DuplicateEntry);
    assert_eq!(duplicate.entry.as_ref().and_then(|e| e.key.as_deref()), Some("B"));
    assert_eq!(
        duplicate.duplicate_of.as_ref().and_then(|e| e.key.as_deref()),
        Some("A")
    );
}

#[test]
fn test_merge_strategies() {
    let input = "@misc{a, title = {T}, note = {first}}\n@misc{b, title = {T}, note = {last}, year = 1}\n";
    let run = |strategy| {
        let options = TidyOptions {
            merge: Some(Toggle::Value(strategy)),
            duplicates: Some(Toggle::Value(vec![DuplicateRule::Citation])),
            ..TidyOptions::default()
        };
        tidy(input, &options).bibtex
    };
    assert_eq!(run(MergeStrategy::First), "@misc{a, title = {T}, note = {first}}\n\n");
    assert_eq!(run(MergeStrategy::Last), "\n@misc{b, title = {T}, note = {last}, year = 1}\n");
    assert!(run(MergeStrategy::Overwrite).contains("note = {last},\n  year = 1\n"));
    assert!(run(MergeStrategy::Combine).contains("note = {first},\n  year = 1\n"));
}

#[test]
fn test_duplicates_without_merge_only_warn() {
    let input = "@misc{a, doi = {10.1/X}}\n@misc{b, doi = { 10.1/x }}\n";
    let options = TidyOptions {
        duplicates: Some(Toggle::Flag(true)),
        ..TidyOptions::default()
    };
    let result = tidy(input, &options);
    assert_eq!(result.bibtex, input);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, WarningCode::DuplicateEntry);
}

#[test]
fn test_generated_key_collision() {
    let input = "@misc{x, author = {Smith, J.}, year = 2020}\n@misc{y, author = {Smith, A.}, year = 2020}\n";
    let options = TidyOptions {
        generate_keys: Some(Toggle::Value("[auth:lower][year]".into())),
        ..TidyOptions::default()
    };
    let result = tidy(input, &options);
    assert_eq!(keys(&result.bibtex), vec!["smith2020", "smith2020a"]);
}

#[test]
fn test_bad_key_template_warns() {
    let input = "@misc{x, author = {Smith}}";
    let options = TidyOptions {
        generate_keys: Some(Toggle::Value("[auth".into())),
        ..TidyOptions::default()
    };
    let result = tidy(input, &options);
    assert_eq!(result.bibtex, input);
    assert_eq!(result.warnings[0].code, WarningCode::InvalidOption);
}

#[test]
fn test_numeric_only_when_enabled() {
    let input = "@misc{k, year = {1998}, month = {jan}, note = {1998a}}";
    assert_eq!(tidy(input, &TidyOptions::default()).bibtex, input);

    let options = TidyOptions {
        numeric: true,
        ..TidyOptions::default()
    };
    assert_eq!(
        tidy(input, &options).bibtex,
        "@misc{k,\n  year = 1998,\n  month = jan,\n  note = {1998a}\n}"
    );
}

#[test]
fn test_escape_only_when_enabled() {
    let input = "@misc{k, title = {Über & more}, url = {http://x.org/ü}}";
    assert_eq!(tidy(input, &TidyOptions::default()).bibtex, input);

    let options = TidyOptions {
        escape: true,
        ..TidyOptions::default()
    };
    let result = tidy(input, &options);
    assert!(result.bibtex.contains(r#"title = {{\"U}ber \& more}"#));
    assert!(result.bibtex.contains("url = {http://x.org/ü}"));
}

#[test]
fn test_missing_key_is_kept() {
    let input = "@article{title = {X}, year = 1999}";
    let result = tidy(input, &TidyOptions::default());
    assert_eq!(result.bibtex, input);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, WarningCode::MissingKey);

    let result = tidy(input, &TidyOptions::recommended());
    assert_eq!(result.count, 1);
    assert_eq!(
        result.warnings.iter().filter(|w| w.code == WarningCode::MissingKey).count(),
        1
    );
    assert!(result.bibtex.starts_with("@article{\n  title"));
}

#[test]
fn test_field_cleanup() {
    let input = "@misc{k, Note = {a}, note = {b}, abstract = {long}, empty = {  }, author = {A and B and C}}";
    let options = TidyOptions {
        omit: vec!["ABSTRACT".into()],
        remove_empty_fields: true,
        remove_duplicate_fields: true,
        max_authors: Some(2),
        enclosing_braces: Some(Toggle::Value(vec!["note".into()])),
        ..TidyOptions::default()
    };
    assert_eq!(
        tidy(input, &options).bibtex,
        "@misc{k,\n  Note = {{a}},\n  author = {A and B and others}\n}"
    );
}

#[test]
fn test_options_from_json() {
    let options = TidyOptions::from_json(
        r#"{"sort": ["-year"], "space": 4, "merge": "first", "sortProperties": true, "wrap": true}"#,
    )
    .unwrap();
    assert_eq!(options.sort_keys(), Some(vec!["-year".to_string()]));
    assert_eq!(options.merge_strategy(), Some(MergeStrategy::First));
    assert_eq!(options.wrap_column(), Some(80));
    assert!(options.field_order().is_some());
    assert!(options.is_layout());

    assert!(matches!(
        TidyOptions::from_json(r#"{"merge": "sideways"}"#),
        Err(Error::Options(_))
    ));
}

#[test]
fn test_tidy_comments_after_recovered_block() {
    let options = TidyOptions {
        tidy_comments: true,
        ..TidyOptions::default()
    };
    let once = tidy("@article(\n@%", &options).bibtex;
    assert_eq!(once, "@article(\n@%\n");
    assert_eq!(tidy(&once, &options).bibtex, once);
}

#[test]
fn test_strip_comments_around_broken_entry() {
    let input = "@misc{k, u = \"b\", t\n@% junk\n@comment{c} \n@misc{j, v = \"c\"}\n";
    let options = TidyOptions {
        strip_comments: true,
        curly: true,
        ..TidyOptions::default()
    };
    let once = tidy(input, &options);
    assert_eq!(
        once.bibtex,
        "@misc{k, u = \"b\", t\n@misc{j,\n  v = {c}\n}\n"
    );
    assert_eq!(once.warnings[0].code, WarningCode::MalformedBlock);
    assert_eq!(tidy(&once.bibtex, &options).bibtex, once.bibtex);
}

#[test]
fn test_quoted_value_ending_in_backslash() {
    let input = "@misc{a, note = \"C:\\\\dir\\\\\"}\n@misc{b, title = {T}}\n";
    let result = tidy(input, &TidyOptions::default());
    assert_eq!(result.count, 2);
    assert!(result.warnings.is_empty());

    let options = TidyOptions {
        curly: true,
        ..TidyOptions::default()
    };
    assert!(tidy(input, &options).bibtex.contains("note = {C:\\\\dir\\\\}"));
}
