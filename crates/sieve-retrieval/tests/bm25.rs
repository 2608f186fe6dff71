use sieve_core::{Document, SieveError};
use sieve_retrieval::{top_k, tokenize, Bm25Index, Bm25Params, Idf};

fn docs(texts: &[&str]) -> Vec<Document> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Document::new(i.to_string(), *t))
        .collect()
}

#[test]
fn cat_query_ranks_cat_documents_first() -> Result<(), SieveError> {
    let index = Bm25Index::build(&docs(&["cat sat on mat", "dog ran in park", "cat chased dog"]));
    let scores = index.score(&tokenize("cat"));

    assert!(scores[0] > scores[1]);
    assert!(scores[2] > scores[1]);

    let best = top_k(&scores, 2)?;
    let picked: Vec<usize> = best.iter().map(|d| d.doc_index).collect();
    assert_eq!(picked, vec![0, 2]);
    assert!(best[0].bm25_score >= best[1].bm25_score);
    Ok(())
}

#[test]
fn top_k_length_is_min_of_k_and_corpus() -> Result<(), SieveError> {
    let index = Bm25Index::build(&docs(&["alpha beta", "beta gamma", "gamma delta", "delta"]));
    let scores = index.score(&tokenize("beta"));
    for k in 0..7 {
        assert_eq!(top_k(&scores, k)?.len(), k.min(4));
    }
    Ok(())
}

#[test]
fn scores_are_invariant_to_corpus_order() {
    let texts = [
        "rust async runtime tokio",
        "python machine learning",
        "rust ownership borrowing lifetimes",
        "async javascript promises",
        "machine code and rust",
    ];
    let forward = docs(&texts);
    let mut reversed = forward.clone();
    reversed.reverse();

    let query = tokenize("rust async machine");
    let a = Bm25Index::build(&forward).score(&query);
    let b = Bm25Index::build(&reversed).score(&query);

    let n = texts.len();
    for i in 0..n {
        assert_eq!(a[i].to_bits(), b[n - 1 - i].to_bits());
    }
}

#[test]
fn rare_terms_outweigh_common_ones() {
    let index = Bm25Index::build(&docs(&[
        "rust tokio runtime",
        "rust python framework",
        "rust java library",
    ]));
    let record = index.search("tokio", 3);
    assert_eq!(record.candidates[0].doc_index, 0);
    assert!(record.candidates[0].bm25_score > 0.0);
    assert_eq!(record.candidates[1].bm25_score, 0.0);
}

#[test]
fn term_frequency_saturates_under_high_k1() {
    let params = Bm25Params::default()
        .with_k1(2.0)
        .with_b(0.5)
        .with_idf(Idf::Plus);
    let index = Bm25Index::with_params(
        &docs(&["rust rust rust async", "rust programming", "python code"]),
        params,
    );
    let record = index.search("rust", 2);
    assert_eq!(record.candidates[0].doc_index, 0);
    assert_eq!(record.candidates[1].doc_index, 1);
}

#[test]
fn multi_term_query_favors_documents_with_both_terms() {
    let index = Bm25Index::build(&docs(&[
        "rust async tokio runtime",
        "rust programming language",
        "async javascript promises",
    ]));
    let record = index.search("rust async", 3);
    assert_eq!(record.candidates[0].doc_index, 0);
}

#[test]
fn repeated_query_terms_count_each_time() {
    let index = Bm25Index::with_params(
        &docs(&["rust tokio", "python flask"]),
        Bm25Params::default().with_idf(Idf::Plus),
    );
    let once = index.score(&tokenize("tokio"))[0];
    let twice = index.score(&tokenize("tokio tokio"))[0];
    assert!((twice - 2.0 * once).abs() < 1e-12);
}

#[test]
fn stop_word_only_query_scores_zero_everywhere() {
    let index = Bm25Index::build(&docs(&["the cat", "a dog"]));
    let record = index.search("the and of", 5);
    assert_eq!(record.candidates.len(), 2);
    assert!(record.candidates.iter().all(|c| c.bm25_score == 0.0));
    assert_eq!(record.candidates[0].doc_index, 0);
}

#[test]
fn empty_corpus_has_no_matches() {
    let index = Bm25Index::build(&[]);
    assert!(index.is_empty());
    assert!(index.search("anything", 10).candidates.is_empty());
}

#[test]
fn doc_freq_uses_normalized_terms() {
    let index = Bm25Index::build(&docs(&["Cat, cat!", "CAT", "dog"]));
    assert_eq!(index.doc_freq("cat"), 2);
    assert_eq!(index.doc_freq("Cat"), 0);
}
