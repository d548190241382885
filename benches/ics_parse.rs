use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use saison::routine::{current_cycle, next_active_date, CycleConfig};

fn semester_calendar(courses: usize) -> String {
    let mut text = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//saison//bench//EN\r\n");
    for i in 0..courses {
        let day = 1 + i % 28;
        text.push_str(&format!(
            "BEGIN:VEVENT\r\nUID:course-{i}\r\nSUMMARY:Course {i}\r\nLOCATION:Room {i}\\, Main building\r\n\
             DTSTART;TZID=Europe/Berlin:202509{day:02}T080000\r\nDTEND;TZID=Europe/Berlin:202509{day:02}T094000\r\n\
             RRULE:FREQ=WEEKLY;UNTIL=20251231T160000Z;INTERVAL=1;BYDAY=MO,WE\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER;RELATED=START:-PT15M\r\nEND:VALARM\r\nEND:VEVENT\r\n"
        ));
    }
    text.push_str("END:VCALENDAR\r\n");
    text
}

fn bench_parse(c: &mut Criterion) {
    let text = semester_calendar(200);
    c.bench_function("parse 200 recurring events", |b| {
        b.iter(|| saison::calendar::parse(black_box(&text)).unwrap())
    });
}

fn bench_cycles(c: &mut Criterion) {
    let monthly = CycleConfig::monthly(&[1, 15, 31]);
    let custom = CycleConfig::custom("FREQ=WEEKLY;INTERVAL=3;BYDAY=TU,FR");
    let day = NaiveDate::from_ymd_opt(2025, 8, 27).unwrap();
    c.bench_function("monthly cycle", |b| {
        b.iter(|| current_cycle(black_box(&monthly), day).unwrap())
    });
    c.bench_function("custom next active date", |b| {
        b.iter(|| next_active_date(black_box(&custom), day).unwrap())
    });
}

criterion_group!(benches, bench_parse, bench_cycles);
criterion_main!(benches);
