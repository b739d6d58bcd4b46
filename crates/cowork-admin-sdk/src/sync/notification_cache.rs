//! 本地通知缓存
//!
//! 职责：
//! - 保存按新到旧排列的通知列表
//! - 维护水位线（见过的最大 id），只增不减
//! - 合并增量响应并去重，保留本地已读状态
//!
//! 不做任何 IO，所有方法都是同步的，由同步引擎在锁内调用，
//! 保证列表与水位线要么一起更新、要么都不更新。

use std::collections::HashSet;

use crate::notification::Notification;

/// 一次增量合并的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaOutcome {
    /// 本次插入到列表头部的通知（保持服务端返回顺序）
    pub inserted: Vec<Notification>,
    /// 需要提醒用户的通知（插入项中的未读部分）
    pub alerts: Vec<Notification>,
    /// 因为已见过而被丢弃的条数
    pub skipped: usize,
    pub watermark_before: u64,
    pub watermark_after: u64,
}

impl DeltaOutcome {
    /// 列表或水位线是否发生了变化
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || self.watermark_after != self.watermark_before
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationCache {
    notifications: Vec<Notification>,
    watermark: u64,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换（首次加载 / 刷新）
    ///
    /// 列表按 id 倒序整理，水位线取列表最大 id，空列表为 0。
    pub fn replace_all(&mut self, mut notifications: Vec<Notification>) {
        notifications.sort_by(|a, b| b.id.cmp(&a.id));
        notifications.dedup_by_key(|n| n.id);
        self.watermark = notifications.iter().map(|n| n.id).max().unwrap_or(0);
        self.notifications = notifications;
    }

    /// 合并一次 check_new 的响应
    ///
    /// - 水位线取 `max(水位线, 响应中所有项的最大 id)`，已读项也参与
    /// - id 不大于旧水位线、或已在缓存中的项不再插入，也不提醒
    /// - `merge_read_items` 为 false 时只插入未读项
    /// - 空响应不做任何修改
    pub fn apply_delta(&mut self, items: Vec<Notification>, merge_read_items: bool) -> DeltaOutcome {
        let watermark_before = self.watermark;
        let mut outcome = DeltaOutcome {
            watermark_before,
            watermark_after: watermark_before,
            ..Default::default()
        };

        let max_id = match items.iter().map(|n| n.id).max() {
            Some(id) => id,
            None => return outcome,
        };

        let mut seen: HashSet<u64> = self.notifications.iter().map(|n| n.id).collect();
        for item in items {
            if item.id <= watermark_before || !seen.insert(item.id) {
                outcome.skipped += 1;
                continue;
            }
            if !item.is_read {
                outcome.alerts.push(item.clone());
                outcome.inserted.push(item);
            } else if merge_read_items {
                outcome.inserted.push(item);
            }
        }

        self.notifications.splice(0..0, outcome.inserted.iter().cloned());
        self.watermark = watermark_before.max(max_id);
        outcome.watermark_after = self.watermark;
        outcome
    }

    /// 将指定通知标记为已读
    ///
    /// 返回 `Some(改动前是否未读)`，缓存中不存在时返回 None。
    pub fn mark_read(&mut self, id: u64) -> Option<bool> {
        self.notifications.iter_mut().find(|n| n.id == id).map(|n| {
            let was_unread = !n.is_read;
            n.is_read = true;
            was_unread
        })
    }

    /// 全部标记为已读，返回实际改动的条数
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.notifications.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        changed
    }

    /// 清空（登出）
    pub fn clear(&mut self) {
        self.notifications.clear();
        self.watermark = 0;
    }

    pub fn get(&self, id: u64) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::notification;

    fn ids(cache: &NotificationCache) -> Vec<u64> {
        cache.notifications().iter().map(|n| n.id).collect()
    }

    #[test]
    fn replace_all_sets_watermark_from_max_id() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(3, true), notification(9, false), notification(5, false)]);
        assert_eq!(ids(&cache), vec![9, 5, 3]);
        assert_eq!(cache.watermark(), 9);
        assert_eq!(cache.unread_count(), 2);

        cache.replace_all(Vec::new());
        assert!(cache.is_empty());
        assert_eq!(cache.watermark(), 0);
    }

    #[test]
    fn apply_delta_prepends_in_response_order() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(5, false)]);

        let outcome = cache.apply_delta(vec![notification(6, false), notification(7, true)], true);

        assert_eq!(ids(&cache), vec![6, 7, 5]);
        assert_eq!(cache.watermark(), 7);
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].id, 6);
        assert_eq!(outcome.watermark_before, 5);
        assert_eq!(outcome.watermark_after, 7);
        assert!(outcome.changed());
    }

    #[test]
    fn unread_only_merge_still_advances_watermark_over_read_items() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(5, false)]);

        let outcome = cache.apply_delta(vec![notification(6, false), notification(7, true)], false);

        assert_eq!(ids(&cache), vec![6, 5]);
        assert_eq!(cache.watermark(), 7);
        assert_eq!(outcome.inserted.len(), 1);

        // 只有已读项的响应也要推进水位线，否则会被无限重复拉取
        let outcome = cache.apply_delta(vec![notification(8, true)], false);
        assert!(outcome.inserted.is_empty());
        assert_eq!(cache.watermark(), 8);
        assert!(outcome.changed());
    }

    #[test]
    fn empty_delta_is_a_no_op() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(5, false), notification(4, true)]);
        let before = cache.clone();

        let outcome = cache.apply_delta(Vec::new(), true);

        assert!(!outcome.changed());
        assert_eq!(cache.watermark(), 5);
        assert_eq!(cache.notifications(), before.notifications());
    }

    #[test]
    fn already_seen_items_are_skipped_and_keep_local_read_state() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(5, false), notification(4, false)]);
        cache.mark_read(5);

        // 服务端违反约定，返回了已见过的 id
        let outcome = cache.apply_delta(vec![notification(5, false), notification(3, false)], true);

        assert_eq!(outcome.skipped, 2);
        assert!(outcome.alerts.is_empty());
        assert!(!outcome.changed());
        assert_eq!(ids(&cache), vec![5, 4]);
        assert!(cache.get(5).unwrap().is_read);
    }

    #[test]
    fn duplicate_ids_inside_one_response_alert_once() {
        let mut cache = NotificationCache::new();
        let outcome = cache.apply_delta(vec![notification(2, false), notification(2, false)], true);
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(ids(&cache), vec![2]);
    }

    #[test]
    fn watermark_never_decreases() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(10, true)]);
        let deltas = vec![
            vec![],
            vec![notification(12, false)],
            vec![notification(11, false)],
            vec![],
            vec![notification(3, true)],
            vec![notification(20, true), notification(15, false)],
        ];
        let mut last = cache.watermark();
        for delta in deltas {
            cache.apply_delta(delta, true);
            assert!(cache.watermark() >= last);
            last = cache.watermark();
        }
        assert_eq!(last, 20);
        assert!(cache.notifications().iter().all(|n| n.id <= cache.watermark()));
    }

    #[test]
    fn mark_read_and_mark_all_read() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(1, false), notification(2, false), notification(3, true)]);

        assert_eq!(cache.mark_read(2), Some(true));
        assert_eq!(cache.mark_read(2), Some(false));
        assert_eq!(cache.mark_read(99), None);
        assert_eq!(cache.unread_count(), 1);

        assert_eq!(cache.mark_all_read(), 1);
        assert_eq!(cache.unread_count(), 0);
        assert!(cache.notifications().iter().all(|n| n.is_read));
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = NotificationCache::new();
        cache.replace_all(vec![notification(7, false)]);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.watermark(), 0);
    }
}
