//! Chart-ready series built from analysis results, expressed as ECharts
//! option documents.

use serde_json::{json, Value};
use text_analysis::{CategoryTally, RankedPost};

pub const CATEGORY_CHART_ID: &str = "category-pie";
pub const TERM_CHART_ID: &str = "term-cloud";
pub const ENGAGEMENT_CHART_ID: &str = "engagement-bar";

const WORD_SIZE_RANGE: [u32; 2] = [20, 100];

/// One chart on the report page.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub option: Value,
}

impl Chart {
    fn new(id: &str, title: &str, option: Value) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            option,
        }
    }
}

fn toolbox() -> Value {
    json!({ "feature": { "saveAsImage": {}, "restore": {} } })
}

/// Ring chart of the category distribution.
pub fn category_pie(tally: &CategoryTally) -> Chart {
    let title = "话题分布分析";
    let data: Vec<Value> = tally
        .entries()
        .iter()
        .map(|(label, count)| json!({ "name": label, "value": count }))
        .collect();

    Chart::new(
        CATEGORY_CHART_ID,
        title,
        json!({
            "title": { "text": title },
            "tooltip": { "trigger": "item" },
            "legend": { "orient": "vertical", "left": "85%", "top": "middle" },
            "series": [{
                "name": "话题分布",
                "type": "pie",
                "radius": ["40%", "75%"],
                "data": data,
                "label": { "formatter": "{b}: {c}条 ({d}%)" }
            }]
        }),
    )
}

/// Word cloud of the given terms, most frequent first.
pub fn term_cloud(terms: &[(String, usize)]) -> Chart {
    let title = "热词分析";
    let data: Vec<Value> = terms
        .iter()
        .map(|(term, count)| json!({ "name": term, "value": count }))
        .collect();

    Chart::new(
        TERM_CHART_ID,
        title,
        json!({
            "title": { "text": title },
            "tooltip": {},
            "toolbox": toolbox(),
            "series": [{
                "name": "词频",
                "type": "wordCloud",
                "shape": "circle",
                "sizeRange": WORD_SIZE_RANGE,
                "data": data
            }]
        }),
    )
}

/// Comments and reposts of the most influential posts, ranked.
pub fn engagement_bar(posts: &[RankedPost<'_>]) -> Chart {
    let title = "高影响力微博互动分析";
    let labels: Vec<String> = (1..=posts.len()).map(|rank| format!("Top{}", rank)).collect();
    let comments: Vec<u64> = posts.iter().map(|r| r.post.comment_count).collect();
    let reposts: Vec<u64> = posts.iter().map(|r| r.post.repost_count).collect();

    Chart::new(
        ENGAGEMENT_CHART_ID,
        title,
        json!({
            "title": { "text": title },
            "tooltip": { "trigger": "axis" },
            "legend": { "top": "bottom" },
            "toolbox": toolbox(),
            "xAxis": { "type": "category", "data": labels, "axisLabel": { "rotate": 30 } },
            "yAxis": { "type": "value", "name": "数量" },
            "dataZoom": [{ "type": "slider" }],
            "series": [
                { "name": "评论数", "type": "bar", "data": comments,
                  "label": { "show": true, "position": "top" } },
                { "name": "转发数", "type": "bar", "data": reposts,
                  "label": { "show": true, "position": "top" } }
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use postpulse_core::Post;

    #[test]
    fn test_pie_keeps_tally_order_and_label_format() {
        let mut tally = CategoryTally::default();
        for label in ["判决相关", "其他", "判决相关"] {
            tally.record(label);
        }

        let chart = category_pie(&tally);
        let series = &chart.option["series"][0];

        assert_eq!(series["type"], "pie");
        assert_eq!(series["radius"], json!(["40%", "75%"]));
        assert_eq!(series["label"]["formatter"], "{b}: {c}条 ({d}%)");
        assert_eq!(
            series["data"],
            json!([{ "name": "判决相关", "value": 2 }, { "name": "其他", "value": 1 }])
        );
    }

    #[test]
    fn test_cloud_uses_size_range() {
        let terms = vec![("法院".to_string(), 9), ("判决".to_string(), 4)];
        let chart = term_cloud(&terms);
        let series = &chart.option["series"][0];

        assert_eq!(series["type"], "wordCloud");
        assert_eq!(series["sizeRange"], json!([20, 100]));
        assert_eq!(series["data"][0], json!({ "name": "法院", "value": 9 }));
    }

    #[test]
    fn test_bar_has_ranked_labels_and_two_series() {
        let posts = vec![
            Post::new("1", "a").with_engagement(7, 30, 0),
            Post::new("2", "b").with_engagement(3, 10, 0),
        ];
        let ranked: Vec<RankedPost<'_>> = posts
            .iter()
            .map(|post| RankedPost { post, score: 0.5 })
            .collect();

        let chart = engagement_bar(&ranked);
        let option = &chart.option;

        assert_eq!(option["xAxis"]["data"], json!(["Top1", "Top2"]));
        assert_eq!(option["series"][0]["name"], "评论数");
        assert_eq!(option["series"][0]["data"], json!([30, 10]));
        assert_eq!(option["series"][1]["data"], json!([7, 3]));
    }
}
