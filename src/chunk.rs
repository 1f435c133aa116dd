/// Splits oversized review input into bounded, coherent pieces.
///
/// Policy, in priority order: pack whole file-sections (unified-diff headers
/// or `--- FILE: x ---` framing) into a chunk until the next section would
/// exceed the byte budget, then flush; a single oversized section becomes its
/// own chunk rather than being dropped. Without recognizable boundaries, fall
/// back to splitting on line boundaries under the same budget.
///
/// Output always has at least one chunk, and boundaries are deterministic for
/// identical input and budget.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    pub content: String,
    pub estimated_bytes: usize,
    /// File identifiers covered by this chunk, in content order. Empty when
    /// the input had no recognizable boundaries.
    pub source_files: Vec<String>,
}

/// One file descriptor for whole-repository grouping.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub size_bytes: usize,
}

/// A review group of whole files, bounded by file count and cumulative bytes.
#[derive(Debug, Clone)]
pub struct FileGroup {
    pub files: Vec<SourceFile>,
    pub total_bytes: usize,
}

/// One boundary-aligned slice of the input: a per-file diff section or a
/// `--- FILE: x ---` framed block.
struct Section {
    content: String,
    file: Option<String>,
}

pub fn split(content: &str, max_chunk_bytes: usize) -> Vec<Chunk> {
    let budget = max_chunk_bytes.max(1);

    // Whole input fits: still return a one-element list so callers never
    // special-case "no chunking needed".
    if content.len() <= budget {
        return finalize(vec![(content.to_string(), collect_files(content))]);
    }

    let chunks = match split_sections(content) {
        Some(sections) => pack_sections(sections, budget),
        None => split_lines(content, budget)
            .into_iter()
            .map(|c| (c, Vec::new()))
            .collect(),
    };

    finalize(chunks)
}

/// Patch `index`/`total` once packing is done.
fn finalize(parts: Vec<(String, Vec<String>)>) -> Vec<Chunk> {
    let total = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(index, (content, source_files))| Chunk {
            index,
            total,
            estimated_bytes: content.len(),
            content,
            source_files,
        })
        .collect()
}

/// Split on per-file boundaries. Returns None when the input has no
/// recognizable markers, so the caller can fall back to line splitting.
fn split_sections(content: &str) -> Option<Vec<Section>> {
    let has_diff_headers = content.lines().any(|l| l.starts_with("diff --git"));
    let has_file_frames = content.lines().any(|l| l.starts_with("--- FILE: "));
    if !has_diff_headers && !has_file_frames {
        return None;
    }

    let is_boundary: fn(&str) -> bool = if has_diff_headers {
        |l| l.starts_with("diff --git")
    } else {
        |l| l.starts_with("--- FILE: ")
    };

    let mut sections = Vec::new();
    let mut current = String::new();
    let mut current_file = None;

    for line in content.lines() {
        if is_boundary(line) && !current.is_empty() {
            sections.push(Section {
                content: std::mem::take(&mut current),
                file: current_file.take(),
            });
        }
        if is_boundary(line) {
            current_file = extract_file_id(line);
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        sections.push(Section {
            content: current,
            file: current_file,
        });
    }

    Some(sections)
}

/// Parse the file identifier out of a boundary line.
/// `diff --git a/path b/path` → `path` (the `b/` side is the post-image).
/// `--- FILE: path ---` → `path`.
fn extract_file_id(line: &str) -> Option<String> {
    if line.starts_with("diff --git") {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            let path = parts[3].strip_prefix("b/").unwrap_or(parts[3]);
            return Some(path.to_string());
        }
        return None;
    }
    line.strip_prefix("--- FILE: ")
        .map(|rest| rest.trim_end_matches(" ---").trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Greedy pack-then-flush: whole sections accumulate until the next one
/// would overflow the budget. An oversized section ships alone.
fn pack_sections(sections: Vec<Section>, budget: usize) -> Vec<(String, Vec<String>)> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_files = Vec::new();

    for section in sections {
        if !current.is_empty() && current.len() + section.content.len() > budget {
            chunks.push((
                std::mem::take(&mut current),
                std::mem::take(&mut current_files),
            ));
        }
        current.push_str(&section.content);
        if let Some(file) = section.file {
            current_files.push(file);
        }
    }
    if !current.is_empty() {
        chunks.push((current, current_files));
    }

    chunks
}

/// Fallback for unsegmented input: split on line boundaries under the byte
/// budget. A single line longer than the budget still ships whole — the
/// boundary invariant (never cut mid-line) wins over the budget.
fn split_lines(content: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > budget {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }

    chunks
}

/// Collect file identifiers for the single-chunk fast path.
fn collect_files(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|l| l.starts_with("diff --git") || l.starts_with("--- FILE: "))
        .filter_map(extract_file_id)
        .collect()
}

/// Group whole files into review groups bounded by both a file-count ceiling
/// and a cumulative-byte ceiling. Same greedy-pack-then-flush shape as diff
/// chunking, over file descriptors instead of diff text.
pub fn group_files(files: &[SourceFile], max_files: usize, max_bytes: usize) -> Vec<FileGroup> {
    let max_files = max_files.max(1);
    let mut groups = Vec::new();
    let mut current: Vec<SourceFile> = Vec::new();
    let mut current_bytes = 0usize;

    for file in files {
        let overflow = !current.is_empty()
            && (current.len() >= max_files || current_bytes + file.size_bytes > max_bytes);
        if overflow {
            groups.push(FileGroup {
                files: std::mem::take(&mut current),
                total_bytes: current_bytes,
            });
            current_bytes = 0;
        }
        current_bytes += file.size_bytes;
        current.push(file.clone());
    }
    if !current.is_empty() {
        groups.push(FileGroup {
            files: current,
            total_bytes: current_bytes,
        });
    }

    groups
}
