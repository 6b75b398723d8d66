use console::style;
use homestead::topics::TOPICS;

pub fn list() {
    for topic in TOPICS.iter() {
        println!(
            "{}  {}",
            style(topic.name).bold(),
            style(format!("--topic {}", topic.id)).dim()
        );
        println!("  {}", topic.description);
        println!("  {}", style(topic.examples.join(" · ")).dim());
        println!();
    }
}
