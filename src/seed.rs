use rand::Rng;

#[derive(serde::Serialize, Debug, Clone)]
struct NewPrescription {
    quantity: f64,
    rate: f64,
}

const SEED_NAMES: [&str; 10] = [
    "Aspirin",
    "Amoxicillin",
    "Lisinopril",
    "Levothyroxine",
    "Metformin",
    "Amlodipine",
    "Omeprazole",
    "Albuterol",
    "Gabapentin",
    "Metoprolol",
];

async fn seed_backend(http: &reqwest::Client, base_url: &str) -> Result<(), reqwest::Error> {
    for name in SEED_NAMES {
        let body = NewPrescription {
            quantity: f64::from(rand::thread_rng().gen_range(10..=90)),
            rate: f64::from(rand::thread_rng().gen_range(1..=6)) * 0.5,
        };
        let response = http
            .post(format!("{}rx/{}", base_url, name))
            .json(&body)
            .send()
            .await?;
        if response.status().is_success() {
            println!(
                "Created {} (quantity {}, rate {})",
                name, body.quantity, body.rate
            );
        } else {
            println!("Skipped {}: backend answered {}", name, response.status());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), reqwest::Error> {
    dotenvy::dotenv().ok();
    let base_url = std::env::var("MEDMINDER_BACKEND_URL")
        .unwrap_or_else(|_| "http://localhost:8080/".to_string());
    let http = reqwest::Client::new();
    seed_backend(&http, &base_url).await
}
