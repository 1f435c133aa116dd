//! Tests for content chunking — boundary-aware packing and line fallback.

use verdict::chunk::{self, SourceFile};

fn diff_section(path: &str, body_bytes: usize) -> String {
    format!(
        "diff --git a/{path} b/{path}\nindex 123..456 100644\n--- a/{path}\n+++ b/{path}\n{}\n",
        "+x".repeat(body_bytes / 2)
    )
}

// ---------------------------------------------------------------------------
// Always at least one chunk
// ---------------------------------------------------------------------------

#[test]
fn empty_input_yields_one_chunk() {
    let chunks = chunk::split("", 1000);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].index, 0);
    assert_eq!(chunks[0].total, 1);
    assert_eq!(chunks[0].content, "");
}

#[test]
fn input_under_budget_yields_one_chunk() {
    let input = "just a small change\n";
    let chunks = chunk::split(input, 1000);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, input);
    assert_eq!(chunks[0].estimated_bytes, input.len());
}

// ---------------------------------------------------------------------------
// Diff-boundary packing
// ---------------------------------------------------------------------------

#[test]
fn large_diff_splits_on_file_boundaries() {
    // ~250KB diff, 5 sections of ~50KB, 80KB budget: sections pack
    // greedily, never splitting a section, and no chunk exceeds the budget.
    let diff: String = (0..5).map(|i| diff_section(&format!("src/file{i}.rs"), 50_000)).collect();
    assert!(diff.len() > 200_000);

    let chunks = chunk::split(&diff, 80_000);
    assert!(chunks.len() > 1);

    for chunk in &chunks {
        assert!(
            chunk.estimated_bytes <= 80_000,
            "chunk {} exceeds the budget at {} bytes",
            chunk.index,
            chunk.estimated_bytes
        );
        // Every chunk starts on a file boundary.
        assert!(chunk.content.starts_with("diff --git"));
    }

    // Concatenation covers the original content.
    let total: usize = chunks.iter().map(|c| c.estimated_bytes).sum();
    assert_eq!(total, diff.len());

    // All five files are attributed, in order.
    let files: Vec<String> = chunks.iter().flat_map(|c| c.source_files.clone()).collect();
    let expected: Vec<String> = (0..5).map(|i| format!("src/file{i}.rs")).collect();
    assert_eq!(files, expected);
}

#[test]
fn oversized_section_becomes_own_chunk() {
    let small = diff_section("small.rs", 1_000);
    let huge = diff_section("huge.rs", 200_000);
    let tail = diff_section("tail.rs", 1_000);
    let diff = format!("{small}{huge}{tail}");

    let chunks = chunk::split(&diff, 80_000);
    // The huge section ships alone rather than being dropped or split.
    let huge_chunk = chunks
        .iter()
        .find(|c| c.source_files.contains(&"huge.rs".to_string()))
        .expect("huge.rs chunk present");
    assert_eq!(huge_chunk.source_files, vec!["huge.rs".to_string()]);
    assert!(huge_chunk.estimated_bytes > 80_000);

    for chunk in &chunks {
        if chunk.source_files != vec!["huge.rs".to_string()] {
            assert!(chunk.estimated_bytes <= 80_000);
        }
    }
}

#[test]
fn file_frame_markers_are_boundaries() {
    let a = format!("--- FILE: src/a.rs ---\n{}\n", "a".repeat(600));
    let b = format!("--- FILE: src/b.rs ---\n{}\n", "b".repeat(600));
    let input = format!("{a}{b}");

    let chunks = chunk::split(&input, 700);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].source_files, vec!["src/a.rs".to_string()]);
    assert_eq!(chunks[1].source_files, vec!["src/b.rs".to_string()]);
}

#[test]
fn chunking_is_deterministic() {
    let diff: String = (0..8).map(|i| diff_section(&format!("f{i}.rs"), 30_000)).collect();
    let first = chunk::split(&diff, 64_000);
    let second = chunk::split(&diff, 64_000);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.content, b.content);
        assert_eq!(a.source_files, b.source_files);
    }
}

// ---------------------------------------------------------------------------
// Line-boundary fallback
// ---------------------------------------------------------------------------

#[test]
fn unsegmented_text_splits_on_lines() {
    let input = "line of plain text here\n".repeat(1000);
    let chunks = chunk::split(&input, 4_000);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.estimated_bytes <= 4_000);
        assert!(chunk.content.ends_with('\n'));
        assert!(chunk.source_files.is_empty());
    }
    let total: usize = chunks.iter().map(|c| c.estimated_bytes).sum();
    assert_eq!(total, input.len());
}

#[test]
fn index_and_total_are_consistent() {
    let input = "x\n".repeat(5000);
    let chunks = chunk::split(&input, 2_000);
    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert_eq!(chunk.total, total);
    }
}

// ---------------------------------------------------------------------------
// File grouping for whole-repository review
// ---------------------------------------------------------------------------

#[test]
fn group_files_respects_both_ceilings() {
    let files: Vec<SourceFile> = (0..10)
        .map(|i| SourceFile {
            path: format!("src/m{i}.rs"),
            size_bytes: 10_000,
        })
        .collect();

    // Byte ceiling binds: 25KB per group → 2 files per group.
    let groups = chunk::group_files(&files, 100, 25_000);
    assert_eq!(groups.len(), 5);
    for group in &groups {
        assert_eq!(group.files.len(), 2);
        assert_eq!(group.total_bytes, 20_000);
    }

    // File-count ceiling binds: 3 files per group.
    let groups = chunk::group_files(&files, 3, 1_000_000);
    assert_eq!(groups.len(), 4);
    assert_eq!(groups[0].files.len(), 3);
    assert_eq!(groups[3].files.len(), 1);
}

#[test]
fn group_files_oversized_file_gets_own_group() {
    let files = vec![
        SourceFile {
            path: "a.rs".to_string(),
            size_bytes: 100,
        },
        SourceFile {
            path: "big.rs".to_string(),
            size_bytes: 50_000,
        },
        SourceFile {
            path: "b.rs".to_string(),
            size_bytes: 100,
        },
    ];
    let groups = chunk::group_files(&files, 10, 10_000);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[1].files[0].path, "big.rs");
}

#[test]
fn group_files_empty_input_yields_no_groups() {
    let groups = chunk::group_files(&[], 10, 10_000);
    assert!(groups.is_empty());
}
