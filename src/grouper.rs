// src/grouper.rs
//! Story clustering over the persisted corpus window. Items sharing
//! significant title words are compared with the token-sort ratio; linked
//! pairs are merged into connected components via union-find, so A~B and B~C
//! land in one cluster even when A~C alone falls under threshold. Recall is
//! preferred over precision here: readers would rather see one story once.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

use crate::models::NewsItem;
use crate::similarity::token_sort_ratio;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "its", "it", "this", "that", "how", "what",
    "new", "into", "as", "has", "more", "can", "about", "will", "may", "up", "out", "just",
    "than", "introducing", "says", "could", "over", "why", "after",
];

/// One story group. Members are sorted by id; `primary_id` is always one of
/// the members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub member_ids: Vec<i64>,
    pub primary_id: i64,
}

impl Cluster {
    pub fn is_singleton(&self) -> bool {
        self.member_ids.len() == 1
    }
}

/// Significant words of a title: lowercase alphanumeric tokens (dotted
/// version numbers stay whole) that are either longer than three characters
/// and not stop words, or purely numeric (model and version names).
pub fn significant_words(title: &str) -> BTreeSet<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"[a-z0-9]+(?:\.[0-9]+)*").expect("token regex"));
    let lower = title.to_lowercase();
    re.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|w| {
            let numeric = w.chars().all(|c| c.is_ascii_digit() || c == '.');
            numeric || (w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
        })
        .collect()
}

/// Partition scored items into story clusters.
///
/// Only items that already carry a score participate; unscored records stay
/// out until a later run scores them. Titles with no significant words are
/// never linked and come back as singletons. Deterministic for a fixed
/// input: members and clusters are ordered by id, and every tie in primary
/// selection breaks on the lowest id.
pub fn group_items(window: &[NewsItem], threshold: f64, vendor_priority: &[String]) -> Vec<Cluster> {
    let mut items: Vec<&NewsItem> = window.iter().filter(|it| it.score.is_some()).collect();
    items.sort_by_key(|it| it.id);

    if items.len() <= 1 {
        return items
            .iter()
            .map(|it| Cluster {
                member_ids: vec![it.id],
                primary_id: it.id,
            })
            .collect();
    }

    let words: Vec<BTreeSet<String>> = items.iter().map(|it| significant_words(&it.title)).collect();

    // Cheap set-intersection filter first, fuzzy comparison only on
    // survivors.
    let mut uf = UnionFind::new(items.len());
    for i in 0..items.len() {
        if words[i].is_empty() {
            continue;
        }
        for j in (i + 1)..items.len() {
            if words[j].is_empty() || words[i].is_disjoint(&words[j]) {
                continue;
            }
            let sim = token_sort_ratio(&items[i].title, &items[j].title);
            if sim >= threshold {
                debug!(
                    a = items[i].id,
                    b = items[j].id,
                    similarity = sim,
                    "linked pair"
                );
                uf.union(i, j);
            }
        }
    }

    // Collect components in id order of their lowest member.
    let mut components: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for idx in 0..items.len() {
        components[uf.find(idx)].push(idx);
    }

    let mut clusters = Vec::new();
    for comp in components.into_iter().filter(|c| !c.is_empty()) {
        let member_ids: Vec<i64> = comp.iter().map(|&i| items[i].id).collect();
        let primary_id = select_primary(comp.iter().map(|&i| items[i]), vendor_priority);
        clusters.push(Cluster {
            member_ids,
            primary_id,
        });
    }
    clusters.sort_by_key(|c| c.member_ids[0]);
    clusters
}

/// Pick the representative item of a cluster.
///
/// Strict priority order: vendor rank (position in the configured list,
/// earlier entries outrank later ones) > highest score > earliest published >
/// lowest id. A vendor-sourced primary therefore survives the arrival of a
/// higher-scored non-vendor member.
fn select_primary<'a>(members: impl Iterator<Item = &'a NewsItem>, vendor_priority: &[String]) -> i64 {
    members
        .min_by_key(|it| {
            (
                vendor_rank(&it.source, vendor_priority),
                std::cmp::Reverse(it.score.unwrap_or(0)),
                published_key(it),
                it.id,
            )
        })
        .map(|it| it.id)
        .expect("cluster has at least one member")
}

fn vendor_rank(source: &str, vendor_priority: &[String]) -> usize {
    vendor_priority
        .iter()
        .position(|v| v.eq_ignore_ascii_case(source.trim()))
        .unwrap_or(usize::MAX)
}

/// Earliest published wins; items without a date sort after all dated ones.
fn published_key(it: &NewsItem) -> (u8, i64) {
    match it.published {
        Some(ts) => (0, ts.timestamp()),
        None => (1, 0),
    }
}

/// A cluster together with its persistent group id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAssignment {
    pub group_id: i64,
    pub member_ids: Vec<i64>,
    pub primary_id: i64,
}

/// Map multi-member clusters to stable group ids.
///
/// A cluster reuses the smallest `group_id` already carried by one of its
/// members, so existing groups absorb newcomers without reshuffling ids that
/// the UI has already shown. Clusters with no prior id get fresh ones above
/// `corpus_max_gid`, the highest group id anywhere in the corpus. Items that
/// aged out of the clustering window keep their `group_id`, so allocating
/// above the window's maximum alone would hand an old group's id to an
/// unrelated new story. Singletons get no assignment and keep
/// `group_id = None`.
pub fn assign_group_ids(
    clusters: &[Cluster],
    window: &[NewsItem],
    corpus_max_gid: i64,
) -> Vec<GroupAssignment> {
    let existing_gid = |id: i64| -> Option<i64> {
        window.iter().find(|it| it.id == id).and_then(|it| it.group_id)
    };
    let window_max = window.iter().filter_map(|it| it.group_id).max().unwrap_or(0);
    let mut next_gid = corpus_max_gid.max(window_max) + 1;
    let mut used: BTreeSet<i64> = BTreeSet::new();
    let mut out = Vec::new();

    for cluster in clusters.iter().filter(|c| !c.is_singleton()) {
        let reused = cluster
            .member_ids
            .iter()
            .filter_map(|&id| existing_gid(id))
            .filter(|gid| !used.contains(gid))
            .min();
        let gid = match reused {
            Some(g) => g,
            None => {
                let g = next_gid;
                next_gid += 1;
                g
            }
        };
        used.insert(gid);
        out.push(GroupAssignment {
            group_id: gid,
            member_ids: cluster.member_ids.clone(),
            primary_id: cluster.primary_id,
        });
    }
    out
}

/// Path-compressing union-find over item indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower root wins so component roots stay deterministic.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchedVia, RawNewsItem};
    use crate::normalize::url_hash;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn item(id: i64, title: &str, source: &str, score: u8) -> NewsItem {
        let raw = RawNewsItem {
            title: title.to_string(),
            url: format!("https://{}.example/{}", source.to_lowercase().replace(' ', "-"), id),
            source: source.to_string(),
            published: Some(now() - Duration::hours(id as i64)),
            description: None,
            fetched_via: FetchedVia::Rss,
        };
        let mut it = NewsItem::from_raw(&raw, url_hash(&raw.url), now());
        it.id = id;
        it.score = Some(score);
        it
    }

    #[test]
    fn significant_words_keep_proper_nouns_and_numbers() {
        let w = significant_words("OpenAI Releases GPT-5 After the Wait");
        assert!(w.contains("openai"));
        assert!(w.contains("releases"));
        assert!(w.contains("5"));
        assert!(!w.contains("the"));
        assert!(!w.contains("after")); // stop word
        assert!(!w.contains("gpt")); // too short, not numeric
    }

    #[test]
    fn dotted_versions_stay_whole() {
        let w = significant_words("Llama 3.1 benchmark results");
        assert!(w.contains("3.1"));
    }

    #[test]
    fn empty_and_singleton_windows_are_noops() {
        assert!(group_items(&[], 0.75, &[]).is_empty());
        let one = [item(1, "OpenAI Releases GPT-5", "TechCrunch", 7)];
        let out = group_items(&one, 0.75, &[]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_singleton());
        assert_eq!(out[0].primary_id, 1);
    }

    #[test]
    fn unscored_items_are_excluded() {
        let mut a = item(1, "OpenAI Releases GPT-5", "TechCrunch", 7);
        a.score = None;
        let b = item(2, "GPT-5 Released by OpenAI", "The Verge", 6);
        let out = group_items(&[a, b], 0.75, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].member_ids, vec![2]);
    }

    #[test]
    fn similar_titles_form_one_cluster() {
        let items = [
            item(1, "OpenAI Releases GPT-5", "TechCrunch", 7),
            item(2, "GPT-5 Released by OpenAI", "The Verge", 6),
            item(3, "Nvidia earnings beat expectations", "Reuters", 8),
        ];
        let out = group_items(&items, 0.60, &[]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].member_ids, vec![1, 2]);
        assert_eq!(out[1].member_ids, vec![3]);
    }

    #[test]
    fn no_shared_significant_words_means_no_fuzzy_comparison() {
        // Near-identical stop-word-heavy titles with disjoint keywords.
        let items = [
            item(1, "Anthropic has a new idea", "A", 5),
            item(2, "Deepmind has a new plan", "B", 5),
        ];
        let out = group_items(&items, 0.50, &[]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn vendor_priority_beats_score() {
        let items = [
            item(1, "OpenAI Releases GPT-5", "OpenAI Blog", 6),
            item(2, "OpenAI Releases GPT-5 today", "TechCrunch", 9),
        ];
        let vendors = vec!["OpenAI Blog".to_string(), "Anthropic".to_string()];
        let out = group_items(&items, 0.75, &vendors);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].primary_id, 1, "vendor item stays primary over higher score");
    }

    #[test]
    fn vendor_list_order_is_a_ranking() {
        let items = [
            item(1, "Claude and GPT-5 compared deeply", "Anthropic", 5),
            item(2, "GPT-5 and Claude compared deeply", "OpenAI Blog", 5),
        ];
        let vendors = vec!["OpenAI Blog".to_string(), "Anthropic".to_string()];
        let out = group_items(&items, 0.75, &vendors);
        assert_eq!(out[0].primary_id, 2, "earlier vendor entry outranks later one");
    }

    #[test]
    fn score_then_date_then_id_tiebreaks() {
        let mut a = item(1, "OpenAI Releases GPT-5", "Blog A", 6);
        let mut b = item(2, "GPT-5 Released by OpenAI", "Blog B", 8);
        let out = group_items(&[a.clone(), b.clone()], 0.75, &[]);
        assert_eq!(out[0].primary_id, 2, "higher score wins without vendors");

        b.score = Some(6);
        a.published = Some(now() - Duration::days(3));
        b.published = Some(now() - Duration::days(1));
        let out = group_items(&[a.clone(), b.clone()], 0.75, &[]);
        assert_eq!(out[0].primary_id, 1, "earlier published wins on score tie");

        b.published = a.published;
        let out = group_items(&[a, b], 0.75, &[]);
        assert_eq!(out[0].primary_id, 1, "lowest id wins the final tie");
    }

    #[test]
    fn rerun_is_byte_identical() {
        let items = [
            item(1, "OpenAI Releases GPT-5", "TechCrunch", 7),
            item(2, "GPT-5 Released by OpenAI", "The Verge", 6),
            item(3, "Anthropic announces Claude 4.2", "Anthropic", 9),
            item(4, "Claude 4.2 announced by Anthropic", "Ars Technica", 5),
        ];
        let a = group_items(&items, 0.70, &["Anthropic".to_string()]);
        let b = group_items(&items, 0.70, &["Anthropic".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn transitive_linking_via_union_find() {
        // Sliding five-token fixture: A and C overlap too little to link
        // directly, but both link to B.
        let a = item(1, "aaaa bbbb cccc dddd eeee", "A", 5);
        let b = item(2, "bbbb cccc dddd eeee ffff", "B", 5);
        let c = item(3, "cccc dddd eeee ffff gggg", "C", 5);
        let sim_ab = token_sort_ratio(&a.title, &b.title);
        let sim_bc = token_sort_ratio(&b.title, &c.title);
        let sim_ac = token_sort_ratio(&a.title, &c.title);
        let threshold = sim_ab.min(sim_bc) - 0.01;
        assert!(
            sim_ac < threshold,
            "fixture must fail direct A~C: ab={sim_ab} bc={sim_bc} ac={sim_ac}"
        );
        let out = group_items(&[a, b, c], threshold, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].member_ids, vec![1, 2, 3]);
    }

    #[test]
    fn assign_reuses_lowest_existing_group_id() {
        let mut a = item(1, "OpenAI Releases GPT-5", "TechCrunch", 7);
        let mut b = item(2, "GPT-5 Released by OpenAI", "The Verge", 6);
        a.group_id = Some(4);
        b.group_id = Some(4);
        let c = item(3, "OpenAI Releases GPT-5 publicly", "Wired", 5);
        let window = [a, b, c];
        let clusters = group_items(&window, 0.65, &[]);
        assert_eq!(clusters.len(), 1);
        let assigned = assign_group_ids(&clusters, &window, 4);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].group_id, 4, "existing cluster absorbs the newcomer");
        assert_eq!(assigned[0].member_ids, vec![1, 2, 3]);
    }

    #[test]
    fn singletons_get_no_group_assignment() {
        let window = [
            item(1, "OpenAI Releases GPT-5", "TechCrunch", 7),
            item(2, "Nvidia earnings beat expectations", "Reuters", 8),
        ];
        let clusters = group_items(&window, 0.75, &[]);
        let assigned = assign_group_ids(&clusters, &window, 0);
        assert!(assigned.is_empty());
    }

    #[test]
    fn fresh_group_ids_start_above_existing_max() {
        let mut a = item(1, "Old story one continues here", "A", 5);
        a.group_id = Some(9);
        let b = item(2, "OpenAI Releases GPT-5", "TechCrunch", 7);
        let c = item(3, "GPT-5 Released by OpenAI", "The Verge", 6);
        let window = [a, b, c];
        let clusters = group_items(&window, 0.75, &[]);
        let assigned = assign_group_ids(&clusters, &window, 9);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].group_id, 10);
    }

    #[test]
    fn fresh_ids_allocate_above_aged_out_groups() {
        // No window member carries a group id, but group 1 still exists on
        // items outside the window.
        let window = [
            item(3, "OpenAI Releases GPT-5", "TechCrunch", 7),
            item(4, "GPT-5 Released by OpenAI", "The Verge", 6),
        ];
        let clusters = group_items(&window, 0.75, &[]);
        let assigned = assign_group_ids(&clusters, &window, 1);
        assert_eq!(assigned.len(), 1);
        assert_eq!(
            assigned[0].group_id, 2,
            "id 1 belongs to a story that aged out of the window"
        );
    }
}
