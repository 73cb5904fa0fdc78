pub const SECONDS_IN_DAY: i64 = 60 * 60 * 24;

/// Coarse recency of a post relative to "now".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bucket {
    None,
    Today,
    Yesterday,
    Older,
}

impl Bucket {
    /// Buckets that open with a separator, in the order a boundary checks them.
    pub const SEPARATED: [Bucket; 3] = [Bucket::Today, Bucket::Yesterday, Bucket::Older];
}

/// Classifies `published` (seconds) against `now` (seconds). An absent
/// timestamp, such as the missing neighbour at either end of the feed, is
/// `Bucket::None`. Posts from the future count as today.
pub fn bucket(published: Option<i64>, now: i64) -> Bucket {
    let published = match published {
        Some(published) => published,
        None => return Bucket::None,
    };

    let age = now.saturating_sub(published);
    if age <= SECONDS_IN_DAY {
        Bucket::Today
    } else if age <= 2 * SECONDS_IN_DAY {
        Bucket::Yesterday
    } else {
        Bucket::Older
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_absent_is_none() {
        assert_eq!(bucket(None, NOW), Bucket::None);
    }

    #[test]
    fn test_today_up_to_one_day() {
        assert_eq!(bucket(Some(NOW), NOW), Bucket::Today);
        assert_eq!(bucket(Some(NOW - 10), NOW), Bucket::Today);
        assert_eq!(bucket(Some(NOW - SECONDS_IN_DAY), NOW), Bucket::Today);
    }

    #[test]
    fn test_yesterday_up_to_two_days() {
        assert_eq!(bucket(Some(NOW - SECONDS_IN_DAY - 1), NOW), Bucket::Yesterday);
        assert_eq!(bucket(Some(NOW - 90_000), NOW), Bucket::Yesterday);
        assert_eq!(bucket(Some(NOW - 2 * SECONDS_IN_DAY), NOW), Bucket::Yesterday);
    }

    #[test]
    fn test_older_past_two_days() {
        assert_eq!(bucket(Some(NOW - 2 * SECONDS_IN_DAY - 1), NOW), Bucket::Older);
        assert_eq!(bucket(Some(NOW - 200_000), NOW), Bucket::Older);
        assert_eq!(bucket(Some(0), NOW), Bucket::Older);
    }

    #[test]
    fn test_future_is_today() {
        assert_eq!(bucket(Some(NOW + 3_600), NOW), Bucket::Today);
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        assert_eq!(bucket(Some(i64::MIN), i64::MAX), Bucket::Older);
        assert_eq!(bucket(Some(i64::MAX), i64::MIN), Bucket::Today);
    }
}
