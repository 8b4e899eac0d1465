use porta_datetime::prelude::*;
use std::env;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // Optional timezone as first argument, e.g. "Pacific/Palau"
    let timezone = args.get(1).map(String::as_str).unwrap_or("UTC");

    let now = PortaDateTime::new("now", timezone)?;
    println!("Timezone: {}", now.timezone());
    println!("Local time: {}", now.format(PortaDateTime::PORTA_DATETIME));
    println!("Billing time (UTC): {}", now.format_porta());
    println!();

    println!("=== Today's Boundaries ===");
    println!("First moment: {}", now.first_moment_string());
    println!("Last moment: {}", now.last_moment_string());
    println!("First moment tomorrow: {}", now.first_moment_next_day_string());
    println!(
        "First moment next month: {}",
        now.first_moment_of_next_month().format_porta()
    );
    println!();

    println!("=== Proration ===");
    for fee in [10.0, 49.99, 130.0] {
        println!(
            "Fee {:.2} prorated till end of month: {:.2}",
            fee,
            now.prorate_till_end_of_month(fee)
        );
    }
    println!();

    println!("=== Billing Strings ===");
    let from_billing = PortaDateTime::from_porta_string("2023-03-20 07:38:17", timezone)?;
    println!(
        "2023-03-20 07:38:17 UTC is {} in {}",
        from_billing.format(PortaDateTime::PORTA_DATETIME),
        from_billing.timezone()
    );

    let period_start = PortaDateTime::new("first day of this month midnight", timezone)?;
    let period_end = PortaDateTime::new("last day of this month 23:59:59", timezone)?;
    println!(
        "Current period: {} .. {}",
        period_start.format_porta(),
        period_end.format_porta()
    );
    println!(
        "Now inside current period: {}",
        now.between(Some(period_start.to_utc()), Some(period_end.to_utc()))
    );
    println!("Period start in past: {}", period_start.in_past());
    println!("Period end in future: {}", period_end.in_future());

    Ok(())
}
