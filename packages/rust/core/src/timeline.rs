//! Date-grouped read view over the paper collection.

use curator_shared::{DayGroup, Paper, TopicId};

/// Papers of one topic grouped by publication day, newest day first and
/// highest score first within a day.
pub fn project(papers: &[Paper], topic_id: &TopicId) -> Vec<DayGroup> {
    group_by_day(
        papers
            .iter()
            .filter(|p| &p.topic_id == topic_id)
            .cloned()
            .collect(),
    )
}

/// Like [`project`], across every topic.
pub fn project_all(papers: &[Paper]) -> Vec<DayGroup> {
    group_by_day(papers.to_vec())
}

fn group_by_day(mut papers: Vec<Paper>) -> Vec<DayGroup> {
    papers.sort_by(|a, b| {
        b.published_date
            .cmp(&a.published_date)
            .then_with(|| b.engagement_score.cmp(&a.engagement_score))
    });

    // Input is date-sorted, so grouping only looks at the previous group.
    let mut groups: Vec<DayGroup> = Vec::new();
    for paper in papers {
        match groups.last_mut() {
            Some(group) if group.date == paper.published_date => group.papers.push(paper),
            _ => groups.push(DayGroup {
                date: paper.published_date,
                papers: vec![paper],
            }),
        }
    }
    groups
}
