pub struct HealthController {}

impl HealthController {
    pub async fn root() -> &'static str {
        "Backend is running ✔️"
    }

    pub async fn get() -> &'static str {
        "OK"
    }
}
