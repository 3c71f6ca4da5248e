use chrono::NaiveDateTime;
use postpulse_core::Post;
use std::fmt;

const COMMENT_WEIGHT: f64 = 0.40;
const REPOST_WEIGHT: f64 = 0.35;
const LIKE_WEIGHT: f64 = 0.25;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A post together with its influence score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPost<'a> {
    pub post: &'a Post,
    pub score: f64,
}

fn ratio(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        value as f64 / max as f64
    }
}

/// Weighted engagement score per post, each counter normalised by the
/// corpus maximum. Scores lie in `0.0..=1.0`.
pub fn influence_scores(posts: &[Post]) -> Vec<f64> {
    let max_comments = posts.iter().map(|p| p.comment_count).max().unwrap_or(0);
    let max_reposts = posts.iter().map(|p| p.repost_count).max().unwrap_or(0);
    let max_likes = posts.iter().map(|p| p.like_count).max().unwrap_or(0);

    posts
        .iter()
        .map(|p| {
            COMMENT_WEIGHT * ratio(p.comment_count, max_comments)
                + REPOST_WEIGHT * ratio(p.repost_count, max_reposts)
                + LIKE_WEIGHT * ratio(p.like_count, max_likes)
        })
        .collect()
}

/// The `n` highest-scoring posts; equal scores keep input order.
pub fn top_influential(posts: &[Post], n: usize) -> Vec<RankedPost<'_>> {
    let mut ranked: Vec<RankedPost<'_>> = posts
        .iter()
        .zip(influence_scores(posts))
        .map(|(post, score)| RankedPost { post, score })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(n);
    ranked
}

/// Headline numbers for a set of stored posts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    pub total: usize,
    pub retweets: usize,
    pub originals: usize,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
    pub avg_comments: f64,
    pub avg_reposts: f64,
    pub avg_likes: f64,
}

impl CrawlSummary {
    pub fn from_posts(posts: &[Post]) -> Self {
        let total = posts.len();
        if total == 0 {
            return Self::default();
        }

        let retweets = posts.iter().filter(|p| p.is_retweet).count();
        // Timestamps the parser could not normalise are left out of the span.
        let times: Vec<NaiveDateTime> = posts
            .iter()
            .filter_map(|p| NaiveDateTime::parse_from_str(&p.timestamp, TIMESTAMP_FORMAT).ok())
            .collect();
        let average = |f: fn(&Post) -> u64| posts.iter().map(f).sum::<u64>() as f64 / total as f64;

        Self {
            total,
            retweets,
            originals: total - retweets,
            earliest: times.iter().min().copied(),
            latest: times.iter().max().copied(),
            avg_comments: average(|p| p.comment_count),
            avg_reposts: average(|p| p.repost_count),
            avg_likes: average(|p| p.like_count),
        }
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} posts ({} original, {} retweets)",
            self.total, self.originals, self.retweets
        )?;
        if let (Some(earliest), Some(latest)) = (self.earliest, self.latest) {
            write!(f, ", {} to {}", earliest, latest)?;
        }
        write!(
            f,
            ", avg {:.1} comments / {:.1} reposts / {:.1} likes",
            self.avg_comments, self.avg_reposts, self.avg_likes
        )
    }
}
