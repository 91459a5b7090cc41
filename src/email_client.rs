use crate::domain::SubscriberEmail;
use reqwest::{Client, Error};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

/// Client for the Brevo transactional email API.
#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    sender_name: String,
    authorization_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        sender_name: String,
        authorization_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            sender,
            sender_name,
            authorization_token,
        })
    }

    pub async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), Error> {
        let url = format!("{}/v3/smtp/email", &self.base_url);
        let request_body = SendEmailRequest {
            sender: Contact {
                email: self.sender.as_ref(),
                name: Some(self.sender_name.as_str()),
            },
            to: [Contact {
                email: recipient.as_ref(),
                name: None,
            }],
            subject,
            html_content,
            text_content,
        };

        self.http_client
            .post(&url)
            .header("api-key", self.authorization_token.expose_secret())
            .header("accept", "application/json")
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Contact<'a>,
    to: [Contact<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
}

#[derive(Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}
