//! Replaces the `books` collection with the fixture catalog. Run against a
//! fresh database before demoing: `cargo run --bin seed_books`.

use chrono::{NaiveDate, NaiveTime};
use dotenv::dotenv;
use mongodb::{
    Client,
    bson::{Bson, DateTime, Document, doc},
};

fn first_of_year(year: i32) -> DateTime {
    let date = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid publication year");
    DateTime::from_millis(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

fn book(
    title: &str,
    description: &str,
    year: i32,
    page_count: i32,
    cover: &str,
) -> Document {
    let now = DateTime::now();
    doc! {
        "title": title,
        "author": "Andrzej Sapkowski",
        "description": description,
        "genre": ["Fantasy", "Adventure"],
        "publicationDate": first_of_year(year),
        "pageCount": page_count,
        "cover": cover,
        "averageRating": Bson::Null,
        "reviews": [],
        "createdAt": now,
        "updatedAt": now,
    }
}

fn witcher_saga() -> Vec<Document> {
    vec![
        book(
            "The Witcher: The Last Wish",
            "The first book in The Witcher saga, introducing the adventures of Geralt of Rivia.",
            1993,
            288,
            "https://covers.example/the-last-wish.jpg",
        ),
        book(
            "The Witcher: Sword of Destiny",
            "The second book in The Witcher saga, a collection of short stories setting the stage for future events.",
            1992,
            400,
            "https://covers.example/sword-of-destiny.jpg",
        ),
        book(
            "The Witcher: Blood of Elves",
            "The third book in The Witcher saga, where the journey of Ciri begins.",
            1994,
            320,
            "https://covers.example/blood-of-elves.jpg",
        ),
        book(
            "The Witcher: Time of Contempt",
            "The fourth book in The Witcher saga, with war brewing and Ciri's fate unfolding.",
            1995,
            352,
            "https://covers.example/time-of-contempt.jpg",
        ),
        book(
            "The Witcher: Baptism of Fire",
            "The fifth book in The Witcher saga, where Geralt forms a new company on his quest to rescue Ciri.",
            1996,
            378,
            "https://covers.example/baptism-of-fire.jpg",
        ),
        book(
            "The Witcher: The Tower of the Swallow",
            "The sixth book in The Witcher saga, where Ciri faces new dangers and visions of her destiny.",
            1997,
            432,
            "https://covers.example/the-tower-of-the-swallow.jpg",
        ),
        book(
            "The Witcher: The Lady of the Lake",
            "The seventh and final book in The Witcher saga, bringing Ciri's story to an epic conclusion.",
            1999,
            544,
            "https://covers.example/the-lady-of-the-lake.jpg",
        ),
    ]
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let database = std::env::var("MONGODB_DATABASE").expect("MONGODB_DATABASE must be set");

    let client = match Client::with_uri_str(&uri).await {
        Ok(client) => client,
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };
    let books = client.database(&database).collection::<Document>("books");

    if let Err(err) = books.delete_many(doc! {}).await {
        println!("🔥 Failed to clear the books collection: {:?}", err);
        std::process::exit(1);
    }

    match books.insert_many(witcher_saga()).await {
        Ok(result) => println!("✅ Seeded {} books", result.inserted_ids.len()),
        Err(err) => {
            println!("🔥 Failed to insert seed data: {:?}", err);
            std::process::exit(1);
        }
    }
}
