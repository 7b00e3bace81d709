use super::month_date::MonthDate;
use super::ports::{CostWindow, Subscription};

/// Sum `price * months` over every subscription's overlap with `window`.
///
/// Open-ended subscriptions run until `now`. A subscription whose clipped
/// interval is empty contributes nothing. Months are counted as boundaries
/// crossed, so an interval inside a single month contributes 0.
pub fn calculate_total_cost(
    subscriptions: &[Subscription],
    window: CostWindow,
    now: MonthDate,
) -> i64 {
    subscriptions
        .iter()
        .map(|subscription| subscription_cost(subscription, window, now))
        .sum()
}

fn subscription_cost(subscription: &Subscription, window: CostWindow, now: MonthDate) -> i64 {
    let actual_start = subscription.start_date;
    let actual_end = subscription.end_date.unwrap_or(now);

    let calc_start = window.from.map_or(actual_start, |from| actual_start.max(from));
    let calc_end = window.to.map_or(actual_end, |to| actual_end.min(to));

    if calc_end < calc_start {
        return 0;
    }

    i64::from(subscription.price) * calc_start.months_until(calc_end)
}
