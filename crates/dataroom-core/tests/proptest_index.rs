//! Property-based tests for chunking and exact search using proptest.

use proptest::prelude::*;

use dataroom_core::index::{Chunk, Chunker, HierarchyLevel, Tokenizer, VectorIndex, WordTokenizer};
use dataroom_core::search::merge_results;
use dataroom_core::{Document, RetrievalResult};

fn tokens(text: &str) -> Vec<String> {
    WordTokenizer
        .spans(text)
        .into_iter()
        .map(|s| text[s].to_string())
        .collect()
}

fn chunker_params() -> impl Strategy<Value = (usize, usize)> {
    (2usize..40).prop_flat_map(|max| (Just(max), 0..max))
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 .,!?\n#]{0,600}",
        prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,12}[.!?]", 0..30)
            .prop_map(|sentences| sentences.join(" ")),
    ]
}

// --- Chunking properties ---

proptest! {
    #[test]
    fn chunking_is_deterministic(text in text_strategy(), (max, overlap) in chunker_params()) {
        let chunker = Chunker::new(max, overlap).unwrap();
        let doc = Document::new("d", "d.txt", text);
        prop_assert_eq!(chunker.chunk(&doc), chunker.chunk(&doc));
    }

    #[test]
    fn chunks_respect_token_bounds(text in text_strategy(), (max, overlap) in chunker_params()) {
        let chunker = Chunker::new(max, overlap).unwrap();
        let chunks = chunker.chunk(&Document::new("d", "d.txt", text));

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(chunk.token_count >= 1);
            prop_assert!(chunk.token_count <= max);
            prop_assert_eq!(WordTokenizer.count(&chunk.text), chunk.token_count);
            prop_assert_eq!(chunk.position_index, i);
            prop_assert_eq!(chunk.id, i as u64);
        }
    }

    #[test]
    fn consecutive_chunks_share_the_overlap(text in text_strategy(), (max, overlap) in chunker_params()) {
        let chunker = Chunker::new(max, overlap).unwrap();
        let chunks = chunker.chunk(&Document::new("d", "d.txt", text));

        for pair in chunks.windows(2) {
            let prev = tokens(&pair[0].text);
            let next = tokens(&pair[1].text);
            let shared = overlap.min(prev.len());
            prop_assert_eq!(&prev[prev.len() - shared..], &next[..shared]);
        }
    }

    #[test]
    fn chunks_cover_every_token_once(text in text_strategy(), (max, overlap) in chunker_params()) {
        let chunker = Chunker::new(max, overlap).unwrap();
        let chunks = chunker.chunk(&Document::new("d", "d.txt", text.clone()));

        let mut rebuilt: Vec<String> = Vec::new();
        for chunk in &chunks {
            let chunk_tokens = tokens(&chunk.text);
            let shared = if rebuilt.is_empty() { 0 } else { overlap.min(rebuilt.len()) };
            rebuilt.extend(chunk_tokens.into_iter().skip(shared));
        }
        prop_assert_eq!(rebuilt, tokens(&text));
    }
}

// --- Search properties ---

fn index_from(vectors: Vec<Vec<f32>>) -> VectorIndex {
    let chunks = (0..vectors.len())
        .map(|i| Chunk {
            id: i as u64,
            document_id: "d".to_string(),
            document_name: "d.txt".to_string(),
            text: format!("chunk {}", i),
            token_count: 2,
            position_index: i,
            section_label: None,
            hierarchy_tag: HierarchyLevel::General,
        })
        .collect();
    VectorIndex::build(chunks, vectors).unwrap()
}

fn vector() -> impl Strategy<Value = Vec<f32>> {
    // a positive first component keeps every vector non-zero
    (0.1f32..1.0, prop::collection::vec(-1.0f32..1.0, 3))
        .prop_map(|(head, tail)| std::iter::once(head).chain(tail).collect())
}

fn is_ranked(results: &[RetrievalResult]) -> bool {
    results.windows(2).all(|w| {
        w[0].similarity > w[1].similarity
            || (w[0].similarity == w[1].similarity && w[0].chunk_id < w[1].chunk_id)
    })
}

proptest! {
    #[test]
    fn search_is_ranked_and_bounded(
        vectors in prop::collection::vec(vector(), 1..40),
        query in vector(),
        k in 1usize..20,
    ) {
        let index = index_from(vectors);
        let results = index.search(&query, k).unwrap();

        prop_assert_eq!(results.len(), k.min(index.len()));
        prop_assert!(is_ranked(&results));
        for r in &results {
            prop_assert!(r.similarity >= -1.001 && r.similarity <= 1.001);
        }
        prop_assert_eq!(index.search(&query, k).unwrap(), results);
    }

    #[test]
    fn search_returns_the_best_matches(
        vectors in prop::collection::vec(vector(), 1..40),
        query in vector(),
    ) {
        let index = index_from(vectors);
        let all = index.search(&query, index.len()).unwrap();
        let top = index.search(&query, 3).unwrap();
        prop_assert_eq!(&all[..top.len()], &top[..]);
    }

    #[test]
    fn merge_keeps_best_similarity_per_chunk(
        lists in prop::collection::vec(
            prop::collection::vec((0u64..15, -1.0f32..1.0), 0..10),
            1..5,
        ),
    ) {
        let lists: Vec<Vec<RetrievalResult>> = lists
            .into_iter()
            .map(|l| l.into_iter().map(|(chunk_id, similarity)| RetrievalResult { chunk_id, similarity }).collect())
            .collect();
        let merged = merge_results(lists.clone());

        prop_assert!(is_ranked(&merged));
        for r in &merged {
            let best = lists
                .iter()
                .flatten()
                .filter(|x| x.chunk_id == r.chunk_id)
                .map(|x| x.similarity)
                .fold(f32::MIN, f32::max);
            prop_assert_eq!(r.similarity, best);
        }
        let mut ids: Vec<u64> = merged.iter().map(|r| r.chunk_id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), merged.len());
    }
}
