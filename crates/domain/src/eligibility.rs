//! 常青内容回收资格评估
//!
//! 纯函数：给定相同的内容元数据、策略和当前时间，结果完全确定。
//! 分类规则按顺序匹配，命中即停止；命中前（含命中规则）所有正向信号
//! 都会记录到 `eligibility_reasons`，供审计和调试使用。

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use crate::entities::{ContentMetrics, EligibleContent, EngagementMetrics, RecycleType};
use publisher_core::EligibilityConfig;

/// 表现分计算策略，返回 0-100
pub trait PerformanceStrategy: Send + Sync {
    fn score(&self, engagement: &EngagementMetrics, age_in_months: u32) -> f64;
}

impl<F> PerformanceStrategy for F
where
    F: Fn(&EngagementMetrics, u32) -> f64 + Send + Sync,
{
    fn score(&self, engagement: &EngagementMetrics, age_in_months: u32) -> f64 {
        self(engagement, age_in_months)
    }
}

/// 默认策略：按曝光计算互动率，再叠加随月龄衰减的新鲜度系数
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementRateStrategy;

impl EngagementRateStrategy {
    /// 互动率达到该值即视为满分
    const SATURATION_RATE: f64 = 0.10;
    const FRESHNESS_FLOOR: f64 = 0.85;
    const FRESHNESS_DECAY_MONTHS: f64 = 24.0;
}

impl PerformanceStrategy for EngagementRateStrategy {
    fn score(&self, engagement: &EngagementMetrics, age_in_months: u32) -> f64 {
        if engagement.impressions == 0 {
            return 0.0;
        }

        let weighted = engagement.likes as f64
            + 2.0 * engagement.shares as f64
            + 1.5 * engagement.comments as f64
            + engagement.clicks as f64;
        let rate = weighted / engagement.impressions as f64;
        let base = (rate / Self::SATURATION_RATE).min(1.0) * 100.0;

        let freshness = Self::FRESHNESS_FLOOR
            + (1.0 - Self::FRESHNESS_FLOOR)
                * (-(f64::from(age_in_months)) / Self::FRESHNESS_DECAY_MONTHS).exp();

        (base * freshness).clamp(0.0, 100.0)
    }
}

/// 回收资格评估器
#[derive(Clone)]
pub struct EligibilityScorer {
    policy: EligibilityConfig,
    strategy: Arc<dyn PerformanceStrategy>,
}

impl EligibilityScorer {
    pub fn new(policy: EligibilityConfig) -> Self {
        Self::with_strategy(policy, Arc::new(EngagementRateStrategy))
    }

    pub fn with_strategy(policy: EligibilityConfig, strategy: Arc<dyn PerformanceStrategy>) -> Self {
        Self { policy, strategy }
    }

    pub fn policy(&self) -> &EligibilityConfig {
        &self.policy
    }

    pub fn classify(&self, content: &ContentMetrics, now: DateTime<Utc>) -> EligibleContent {
        let age = age_in_months(content.published_at, now);
        let score = self
            .strategy
            .score(&content.engagement, age)
            .clamp(0.0, 100.0);

        let (recycle_type, reasons) = self.evaluate_rules(content, age, score);

        EligibleContent {
            content_id: content.content_id.clone(),
            recycle_type,
            performance_score: score,
            age_in_months: age,
            eligibility_reasons: reasons,
        }
    }

    fn evaluate_rules(
        &self,
        content: &ContentMetrics,
        age: u32,
        score: f64,
    ) -> (RecycleType, Vec<String>) {
        let policy = &self.policy;
        let mut reasons = Vec::new();

        // 1. 月龄不足或被标记为非常青
        if age < policy.minimum_age_months {
            return (RecycleType::NotRecyclable, reasons);
        }
        reasons.push(format!(
            "age qualifies: {} months >= {} month minimum",
            age, policy.minimum_age_months
        ));
        if content.is_marked_non_evergreen() {
            return (RecycleType::NotRecyclable, reasons);
        }

        // 2. 高表现且没有时效性引用
        let high_performance = score >= policy.high_threshold;
        if high_performance {
            reasons.push(format!(
                "high performance: score {:.1} >= {:.1}",
                score, policy.high_threshold
            ));
        }
        let timeless = !content.has_time_bound_references();
        if timeless {
            reasons.push("no time-bound references".to_string());
        }
        if high_performance && timeless {
            return (RecycleType::PureEvergreen, reasons);
        }

        // 3. 周期性主题，且当前处于周年复用窗口内
        let seasonal_theme = content
            .seasonal_themes()
            .find(|(_, period)| within_season_window(age, *period, policy.season_window_months));
        if let Some((theme, _)) = seasonal_theme {
            reasons.push(format!("seasonal theme '{}' within reuse window", theme));
            return (RecycleType::SeasonalEvergreen, reasons);
        }

        // 4. 表现尚可
        if score >= policy.low_threshold {
            reasons.push(format!(
                "acceptable performance: score {:.1} >= {:.1}",
                score, policy.low_threshold
            ));
            return (RecycleType::Durable, reasons);
        }

        (RecycleType::NotRecyclable, reasons)
    }
}

/// 发布时间到当前时间之间完整的自然月数，不会为负
pub fn age_in_months(published_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    if now <= published_at {
        return 0;
    }

    let mut months = (now.year() - published_at.year()) * 12 + now.month() as i32
        - published_at.month() as i32;
    if (now.day(), now.time()) < (published_at.day(), published_at.time()) {
        months -= 1;
    }
    months.max(0) as u32
}

/// 月龄距离最近一个周年点不超过 `window` 个月
fn within_season_window(age: u32, period: u32, window: u32) -> bool {
    if period == 0 {
        return false;
    }
    let offset = age % period;
    offset <= window || period - offset <= window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ContentTag;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn content(published_at: DateTime<Utc>, tags: Vec<ContentTag>) -> ContentMetrics {
        ContentMetrics {
            content_id: "article-1".to_string(),
            published_at,
            engagement: EngagementMetrics::default(),
            tags,
        }
    }

    fn scorer_with_score(score: f64) -> EligibilityScorer {
        EligibilityScorer::with_strategy(
            EligibilityConfig::default(),
            Arc::new(move |_: &EngagementMetrics, _: u32| score),
        )
    }

    fn months_ago(months: u32) -> DateTime<Utc> {
        now()
            .checked_sub_months(chrono::Months::new(months))
            .unwrap()
    }

    #[test]
    fn test_age_in_months() {
        let published = Utc.with_ymd_and_hms(2023, 11, 15, 12, 0, 0).unwrap();
        assert_eq!(age_in_months(published, now()), 7);

        let published = Utc.with_ymd_and_hms(2023, 11, 16, 0, 0, 0).unwrap();
        assert_eq!(age_in_months(published, now()), 6);

        assert_eq!(age_in_months(now() + Duration::days(3), now()), 0);
    }

    #[test]
    fn test_seven_month_high_performer_is_pure_evergreen() {
        let result = scorer_with_score(85.0).classify(&content(months_ago(7), vec![]), now());

        assert_eq!(result.recycle_type, RecycleType::PureEvergreen);
        assert_eq!(result.age_in_months, 7);
        assert_eq!(result.performance_score, 85.0);
        assert_eq!(
            result.eligibility_reasons,
            vec![
                "age qualifies: 7 months >= 6 month minimum".to_string(),
                "high performance: score 85.0 >= 75.0".to_string(),
                "no time-bound references".to_string(),
            ]
        );
    }

    #[test]
    fn test_young_content_never_recyclable() {
        for score in [0.0, 50.0, 99.9, 100.0] {
            let result = scorer_with_score(score).classify(&content(months_ago(5), vec![]), now());
            assert_eq!(result.recycle_type, RecycleType::NotRecyclable);
            assert!(result.eligibility_reasons.is_empty());
        }
    }

    #[test]
    fn test_non_evergreen_tag_blocks_recycling() {
        let result = scorer_with_score(95.0)
            .classify(&content(months_ago(12), vec![ContentTag::NonEvergreen]), now());
        assert_eq!(result.recycle_type, RecycleType::NotRecyclable);
        assert_eq!(
            result.eligibility_reasons,
            vec!["age qualifies: 12 months >= 6 month minimum".to_string()]
        );
    }

    #[test]
    fn test_time_bound_high_performer_falls_back_to_durable() {
        let result = scorer_with_score(90.0)
            .classify(&content(months_ago(8), vec![ContentTag::TimeBound]), now());

        assert_eq!(result.recycle_type, RecycleType::Durable);
        assert!(result
            .eligibility_reasons
            .contains(&"high performance: score 90.0 >= 75.0".to_string()));
        assert!(result
            .eligibility_reasons
            .contains(&"acceptable performance: score 90.0 >= 50.0".to_string()));
        assert!(!result
            .eligibility_reasons
            .contains(&"no time-bound references".to_string()));
    }

    #[test]
    fn test_seasonal_content_within_window() {
        let christmas = ContentTag::Seasonal {
            theme: "christmas".to_string(),
            period_months: 12,
        };

        // 11个月：距离周年1个月，在窗口内
        let result = scorer_with_score(30.0)
            .classify(&content(months_ago(11), vec![christmas.clone()]), now());
        assert_eq!(result.recycle_type, RecycleType::SeasonalEvergreen);
        assert_eq!(
            result.eligibility_reasons.last().unwrap(),
            "seasonal theme 'christmas' within reuse window"
        );
        assert!(result
            .eligibility_reasons
            .contains(&"no time-bound references".to_string()));

        // 8个月：不在窗口内，表现分也不足
        let result =
            scorer_with_score(30.0).classify(&content(months_ago(8), vec![christmas]), now());
        assert_eq!(result.recycle_type, RecycleType::NotRecyclable);
    }

    #[test]
    fn test_low_score_not_recyclable() {
        let result = scorer_with_score(49.9).classify(&content(months_ago(9), vec![]), now());
        assert_eq!(result.recycle_type, RecycleType::NotRecyclable);
        assert_eq!(
            result.eligibility_reasons,
            vec![
                "age qualifies: 9 months >= 6 month minimum".to_string(),
                "no time-bound references".to_string(),
            ]
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let scorer = EligibilityScorer::new(EligibilityConfig::default());
        let mut item = content(months_ago(10), vec![]);
        item.engagement = EngagementMetrics {
            impressions: 1000,
            likes: 40,
            shares: 10,
            comments: 8,
            clicks: 20,
        };

        let first = scorer.classify(&item, now());
        let second = scorer.classify(&item, now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_engagement_rate_strategy() {
        let strategy = EngagementRateStrategy;
        assert_eq!(strategy.score(&EngagementMetrics::default(), 3), 0.0);

        let strong = EngagementMetrics {
            impressions: 1000,
            likes: 200,
            shares: 50,
            comments: 40,
            clicks: 100,
        };
        let fresh = strategy.score(&strong, 0);
        assert!((fresh - 100.0).abs() < 1e-9);

        let old = strategy.score(&strong, 48);
        assert!(old < fresh);
        assert!(old >= 85.0);

        let weak = EngagementMetrics {
            impressions: 1000,
            likes: 10,
            ..Default::default()
        };
        assert!(strategy.score(&weak, 0) < strategy.score(&strong, 0));
    }
}
