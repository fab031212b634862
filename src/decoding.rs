//! Decoder-side search for sequence-to-sequence generation.
//!
//! Both searches are driven by a `step` callback that returns next-token
//! logits for one sequence. Every hypothesis carries its own state `S`
//! (for the T5 summarizer, a model clone holding that hypothesis' key/value
//! cache); when a beam forks, its state is cloned with it. Lengths count the
//! decoder start token, as the Hugging Face generation utilities do.

use crate::error::Result;

/// Length and repetition constraints shared by every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRules {
    pub max_length: usize,
    pub min_length: usize,
    pub no_repeat_ngram_size: usize,
    pub eos_token_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSettings {
    pub num_beams: usize,
    pub length_penalty: f64,
    pub early_stopping: bool,
}

impl Default for BeamSettings {
    fn default() -> Self {
        Self { num_beams: 1, length_penalty: 1.0, early_stopping: false }
    }
}

/// Extends `start` one token at a time with whatever `pick` chooses until
/// EOS or `max_length`. Returns the generated tokens without `start`.
pub fn greedy_decode<S, F, P>(
    mut state: S,
    start: u32,
    rules: &DecodeRules,
    mut step: F,
    mut pick: P,
) -> Result<Vec<u32>>
where
    F: FnMut(&mut S, &[u32]) -> Result<Vec<f32>>,
    P: FnMut(&[f32]) -> Result<u32>,
{
    let mut ids = vec![start];
    while ids.len() < rules.max_length {
        let mut scores = step(&mut state, &ids)?;
        apply_rules(&mut scores, &ids, rules);

        let next = pick(&scores)?;
        if next == rules.eos_token_id {
            break;
        }
        ids.push(next);
    }
    ids.remove(0);
    Ok(ids)
}

struct Beam<S> {
    ids: Vec<u32>,
    score: f64,
    state: S,
}

struct Candidate {
    beam: usize,
    token: u32,
    score: f64,
}

/// Beam search over log-probabilities. Finished hypotheses are ranked by
/// `sum_logprobs / len^length_penalty`; with one beam this is greedy search.
pub fn beam_decode<S, F>(
    state: S,
    start: u32,
    rules: &DecodeRules,
    settings: &BeamSettings,
    mut step: F,
) -> Result<Vec<u32>>
where
    S: Clone,
    F: FnMut(&mut S, &[u32]) -> Result<Vec<f32>>,
{
    let num_beams = settings.num_beams.max(1);
    let mut hypotheses = Hypotheses::new(num_beams, settings.length_penalty, settings.early_stopping);
    let mut beams = vec![Beam { ids: vec![start], score: 0.0, state }];
    let mut finished = false;

    while beams[0].ids.len() < rules.max_length {
        let mut candidates = Vec::with_capacity(beams.len() * 2 * num_beams);
        for (idx, beam) in beams.iter_mut().enumerate() {
            let logits = step(&mut beam.state, &beam.ids)?;
            let mut logprobs = log_softmax(&logits);
            apply_rules(&mut logprobs, &beam.ids, rules);

            for (token, logprob) in top_k(&logprobs, 2 * num_beams) {
                candidates.push(Candidate { beam: idx, token, score: beam.score + f64::from(logprob) });
            }
        }
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.beam.cmp(&b.beam))
                .then(a.token.cmp(&b.token))
        });
        candidates.truncate(2 * num_beams);

        let mut next_beams = Vec::with_capacity(num_beams);
        for (rank, candidate) in candidates.iter().enumerate() {
            if !candidate.score.is_finite() {
                continue;
            }
            let parent = &beams[candidate.beam];
            if candidate.token == rules.eos_token_id {
                // an EOS outside the top `num_beams` does not finish a hypothesis
                if rank < num_beams {
                    hypotheses.add(parent.ids.clone(), candidate.score, parent.ids.len());
                }
                continue;
            }
            let mut ids = parent.ids.clone();
            ids.push(candidate.token);
            next_beams.push(Beam { ids, score: candidate.score, state: parent.state.clone() });
            if next_beams.len() == num_beams {
                break;
            }
        }

        let best_running = next_beams.first().map(|beam| (beam.score, beam.ids.len()));
        if next_beams.is_empty() || hypotheses.is_done(best_running) {
            finished = true;
            break;
        }
        beams = next_beams;
    }

    if !finished {
        for beam in &beams {
            hypotheses.add(beam.ids.clone(), beam.score, beam.ids.len() - 1);
        }
    }

    let mut best = hypotheses.best().unwrap_or_else(|| vec![start]);
    best.remove(0);
    Ok(best)
}

/// The best `capacity` finished hypotheses seen so far.
struct Hypotheses {
    capacity: usize,
    length_penalty: f64,
    early_stopping: bool,
    entries: Vec<(f64, Vec<u32>)>,
}

impl Hypotheses {
    fn new(capacity: usize, length_penalty: f64, early_stopping: bool) -> Self {
        Self { capacity, length_penalty, early_stopping, entries: Vec::new() }
    }

    fn worst_score(&self) -> f64 {
        self.entries.last().map_or(f64::NEG_INFINITY, |(score, _)| *score)
    }

    /// `generated_len` counts the tokens the penalty applies to.
    fn add(&mut self, ids: Vec<u32>, sum_logprobs: f64, generated_len: usize) {
        let score = length_penalized(sum_logprobs, generated_len, self.length_penalty);
        if self.entries.len() == self.capacity && score <= self.worst_score() {
            return;
        }
        let at = self.entries.partition_point(|(existing, _)| *existing >= score);
        self.entries.insert(at, (score, ids));
        self.entries.truncate(self.capacity);
    }

    /// Whether no running beam can still beat the kept hypotheses.
    fn is_done(&self, best_running: Option<(f64, usize)>) -> bool {
        if self.entries.len() < self.capacity {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        match best_running {
            Some((score, len)) => self.worst_score() >= length_penalized(score, len, self.length_penalty),
            None => true,
        }
    }

    fn best(self) -> Option<Vec<u32>> {
        self.entries.into_iter().next().map(|(_, ids)| ids)
    }
}

pub fn length_penalized(sum_logprobs: f64, len: usize, length_penalty: f64) -> f64 {
    sum_logprobs / (len.max(1) as f64).powf(length_penalty)
}

/// Bans EOS before `min_length` and tokens that would repeat an n-gram.
fn apply_rules(scores: &mut [f32], ids: &[u32], rules: &DecodeRules) {
    if ids.len() < rules.min_length {
        ban(scores, rules.eos_token_id);
    }
    for token in banned_ngram_tokens(ids, rules.no_repeat_ngram_size) {
        ban(scores, token);
    }
}

fn ban(scores: &mut [f32], token: u32) {
    if let Some(score) = scores.get_mut(token as usize) {
        *score = f32::NEG_INFINITY;
    }
}

/// Tokens that would complete an n-gram already present in `ids`.
fn banned_ngram_tokens(ids: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || ids.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &ids[ids.len() + 1 - n..];
    ids.windows(n)
        .filter(|window| &window[..n - 1] == prefix)
        .map(|window| window[n - 1])
        .collect()
}

/// Index of the highest score; the lowest index wins ties.
pub fn argmax(scores: &[f32]) -> u32 {
    let mut best = 0;
    for (idx, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = idx;
        }
    }
    best as u32
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![f32::NEG_INFINITY; logits.len()];
    }
    let log_sum = logits.iter().map(|l| (l - max).exp()).sum::<f32>().ln();
    logits.iter().map(|l| l - max - log_sum).collect()
}

/// The `k` best tokens, highest first, lowest index first on ties.
fn top_k(scores: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut ranked: Vec<(u32, f32)> = scores.iter().enumerate().map(|(i, s)| (i as u32, *s)).collect();
    let by_score = |a: &(u32, f32), b: &(u32, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
    if k < ranked.len() {
        ranked.select_nth_unstable_by(k, by_score);
        ranked.truncate(k);
    }
    ranked.sort_by(by_score);
    ranked
}
