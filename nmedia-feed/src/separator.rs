use nmedia_msg::{FeedItem, Post, Separator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bucket::{bucket, Bucket};

/// Text shown on the separator that opens each bucket.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SeparatorLabels {
    pub today: String,
    pub yesterday: String,
    pub older: String,
}

impl Default for SeparatorLabels {
    fn default() -> Self {
        Self {
            today: "Today".to_string(),
            yesterday: "Yesterday".to_string(),
            older: "Last week".to_string(),
        }
    }
}

impl SeparatorLabels {
    pub fn label(&self, bucket: Bucket) -> Option<&str> {
        match bucket {
            Bucket::None => None,
            Bucket::Today => Some(self.today.as_str()),
            Bucket::Yesterday => Some(self.yesterday.as_str()),
            Bucket::Older => Some(self.older.as_str()),
        }
    }
}

/// The bucket a separator placed between `before` and `after` would open,
/// if any. At most one separator fits a boundary.
pub fn separator_between(before: Bucket, after: Bucket) -> Option<Bucket> {
    Bucket::SEPARATED
        .iter()
        .copied()
        .find(|target| before != *target && after == *target)
}

/// Interleaves separators into a feed that arrives a page at a time.
///
/// Only the bucket of the last post pushed is kept, so each new boundary is
/// decided without looking back at what was already emitted. `now` is fixed
/// for the lifetime of the inserter; feeding it the same prefix again gives
/// the same placement.
#[derive(Clone, Debug)]
pub struct SeparatorInserter {
    now: i64,
    labels: Arc<SeparatorLabels>,
    last: Bucket,
    finished: bool,
}

impl SeparatorInserter {
    pub fn new(now: i64, labels: Arc<SeparatorLabels>) -> Self {
        Self {
            now,
            labels,
            last: Bucket::None,
            finished: false,
        }
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn push(&mut self, post: Post, out: &mut Vec<FeedItem>) {
        let after = bucket(Some(post.published), self.now);
        self.separate(after, out);
        self.last = after;
        out.push(FeedItem::Post(post));
    }

    /// Closes the tail boundary once the source is exhausted. Safe to call
    /// more than once.
    pub fn finish(&mut self, out: &mut Vec<FeedItem>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.separate(bucket(None, self.now), out);
    }

    fn separate(&self, after: Bucket, out: &mut Vec<FeedItem>) {
        if let Some(target) = separator_between(self.last, after) {
            if let Some(label) = self.labels.label(target) {
                out.push(FeedItem::Separator(Separator::new(label)));
            }
        }
    }
}

/// One-shot insertion over an already materialized sequence.
pub fn insert_separators(
    posts: impl IntoIterator<Item = Post>,
    now: i64,
    labels: Arc<SeparatorLabels>,
    source_complete: bool,
) -> Vec<FeedItem> {
    let mut inserter = SeparatorInserter::new(now, labels);
    let mut out = Vec::new();
    for post in posts {
        inserter.push(post, &mut out);
    }
    if source_complete {
        inserter.finish(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::SECONDS_IN_DAY;
    use nmedia_ref::PostId;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000;

    fn post(id: u64, age: i64) -> Post {
        Post {
            id: PostId(id),
            published: NOW - age,
            ..Post::empty()
        }
    }

    fn labels() -> Arc<SeparatorLabels> {
        Arc::new(SeparatorLabels::default())
    }

    fn render(items: &[FeedItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                FeedItem::Post(post) => format!("post {}", post.id),
                FeedItem::Separator(separator) => separator.label.clone(),
            })
            .collect()
    }

    #[test]
    fn test_separator_between_priority() {
        assert_eq!(
            separator_between(Bucket::None, Bucket::Today),
            Some(Bucket::Today)
        );
        assert_eq!(
            separator_between(Bucket::Today, Bucket::Yesterday),
            Some(Bucket::Yesterday)
        );
        assert_eq!(
            separator_between(Bucket::Today, Bucket::Older),
            Some(Bucket::Older)
        );
        assert_eq!(separator_between(Bucket::Older, Bucket::Older), None);
        assert_eq!(separator_between(Bucket::Today, Bucket::None), None);
        assert_eq!(separator_between(Bucket::None, Bucket::None), None);
    }

    #[test]
    fn test_insert_separators_at_bucket_changes() {
        let posts = vec![
            post(6, 10),
            post(5, 20),
            post(4, 90_000),
            post(3, 3 * SECONDS_IN_DAY),
            post(2, 4 * SECONDS_IN_DAY),
        ];

        let items = insert_separators(posts, NOW, labels(), true);

        assert_eq!(
            render(&items),
            vec![
                "Today",
                "post 6",
                "post 5",
                "Yesterday",
                "post 4",
                "Last week",
                "post 3",
                "post 2",
            ]
        );
    }

    #[test]
    fn test_no_trailing_separator() {
        let items = insert_separators(vec![post(1, 10)], NOW, labels(), true);
        assert_eq!(render(&items), vec!["Today", "post 1"]);
    }

    #[test]
    fn test_empty_source() {
        assert!(insert_separators(Vec::new(), NOW, labels(), true).is_empty());
    }

    #[test]
    fn test_out_of_order_buckets_separate_again() {
        let items = insert_separators(
            vec![post(3, 200_000), post(2, 10), post(1, 200_000)],
            NOW,
            labels(),
            false,
        );
        assert_eq!(
            render(&items),
            vec!["Last week", "post 3", "Today", "post 2", "Last week", "post 1"]
        );
    }

    #[test]
    fn test_custom_labels() {
        let labels = Arc::new(SeparatorLabels {
            today: "Сегодня".to_string(),
            yesterday: "Вчера".to_string(),
            older: "На прошлой неделе".to_string(),
        });
        let items = insert_separators(vec![post(2, 10), post(1, 90_000)], NOW, labels, true);
        assert_eq!(
            render(&items),
            vec!["Сегодня", "post 2", "Вчера", "post 1"]
        );
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut inserter = SeparatorInserter::new(NOW, labels());
        let mut out = Vec::new();
        inserter.push(post(1, 10), &mut out);
        inserter.finish(&mut out);
        inserter.finish(&mut out);
        assert_eq!(out.len(), 2);
    }

    fn bucket_strategy() -> impl Strategy<Value = Bucket> {
        prop_oneof![
            Just(Bucket::None),
            Just(Bucket::Today),
            Just(Bucket::Yesterday),
            Just(Bucket::Older),
        ]
    }

    proptest! {
        #[test]
        fn prop_separator_iff_bucket_changes(
            before in bucket_strategy(),
            after in bucket_strategy(),
        ) {
            let separated = separator_between(before, after);
            if before != after && after != Bucket::None {
                prop_assert_eq!(separated, Some(after));
            } else {
                prop_assert_eq!(separated, None);
            }
        }

        #[test]
        fn prop_incremental_matches_whole(
            ages in prop::collection::vec(-1_000i64..400_000, 0..40),
            split in 0usize..40,
        ) {
            let posts: Vec<Post> = ages
                .iter()
                .enumerate()
                .map(|(index, age)| post(index as u64 + 1, *age))
                .collect();
            let whole = insert_separators(posts.clone(), NOW, labels(), true);

            let split = split.min(posts.len());
            let mut inserter = SeparatorInserter::new(NOW, labels());
            let mut out = Vec::new();
            for post in posts[..split].iter().cloned() {
                inserter.push(post, &mut out);
            }
            let prefix = out.clone();
            for post in posts[split..].iter().cloned() {
                inserter.push(post, &mut out);
            }
            inserter.finish(&mut out);

            prop_assert_eq!(&out[..prefix.len()], &prefix[..]);
            prop_assert_eq!(out, whole);
        }
    }
}
