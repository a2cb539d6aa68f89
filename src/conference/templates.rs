use crate::database::models::notification_kind::NotificationKind;

/// Values substituted into notification emails.
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub conference: String,
    pub recipient_name: String,
    pub submission_id: uuid::Uuid,
    pub title: String,
    /// Reviewer comment or payment note
    pub comment: Option<String>,
    pub fee_cents: i64,
    pub currency: String,
    pub base_url: String,
}

impl NotificationContext {
    pub fn submission_url(&self) -> String {
        format!(
            "{}/api/submissions/{}",
            self.base_url.trim_end_matches('/'),
            self.submission_id
        )
    }

    pub fn loa_url(&self) -> String {
        format!("{}/loa", self.submission_url())
    }

    fn fee(&self) -> String {
        format!(
            "{}.{:02} {}",
            self.fee_cents / 100,
            self.fee_cents % 100,
            self.currency
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Minimal escaping for values interpolated into the html body.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn render(kind: NotificationKind, ctx: &NotificationContext) -> RenderedEmail {
    let (subject, paragraphs) = match kind {
        NotificationKind::SubmissionReceived => (
            format!("[{}] Submission received", ctx.conference),
            vec![
                format!("We have received your abstract \"{}\".", ctx.title),
                "You will be notified once the review committee has reached a decision.".to_string(),
            ],
        ),
        NotificationKind::Approval => (
            format!("[{}] Your abstract has been accepted", ctx.conference),
            vec![format!(
                "Congratulations! Your abstract \"{}\" has been accepted.",
                ctx.title
            )],
        ),
        NotificationKind::Rejection => (
            format!("[{}] Decision on your abstract", ctx.conference),
            vec![format!(
                "We regret to inform you that your abstract \"{}\" was not accepted.",
                ctx.title
            )],
        ),
        NotificationKind::PaymentRequest => (
            format!("[{}] Registration payment", ctx.conference),
            vec![
                format!(
                    "To confirm your presentation of \"{}\", please pay the registration fee of {}.",
                    ctx.title,
                    ctx.fee()
                ),
                format!(
                    "Upload your proof of payment at {}/payment.",
                    ctx.submission_url()
                ),
            ],
        ),
        NotificationKind::PaymentApproved => (
            format!("[{}] Payment confirmed", ctx.conference),
            vec![
                format!(
                    "Your registration payment for \"{}\" has been verified.",
                    ctx.title
                ),
                "Your Letter of Acceptance is attached.".to_string(),
            ],
        ),
        NotificationKind::PaymentRejected => (
            format!("[{}] Payment could not be verified", ctx.conference),
            vec![
                format!(
                    "We could not verify the payment proof for \"{}\".",
                    ctx.title
                ),
                format!(
                    "Please upload a new proof at {}/payment.",
                    ctx.submission_url()
                ),
            ],
        ),
    };

    let mut paragraphs = paragraphs;
    if let Some(comment) = ctx.comment.as_deref().filter(|c| !c.trim().is_empty()) {
        paragraphs.push(format!("Comment from the committee: {comment}"));
    }

    let greeting = format!("Dear {},", ctx.recipient_name);
    let closing = format!("Kind regards,\n{}", ctx.conference);

    let text = std::iter::once(greeting.clone())
        .chain(paragraphs.iter().cloned())
        .chain(std::iter::once(closing.clone()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let html = std::iter::once(greeting)
        .chain(paragraphs)
        .chain(std::iter::once(closing))
        .map(|p| format!("<p>{}</p>", escape_html(&p).replace('\n', "<br>")))
        .collect::<String>();

    RenderedEmail {
        subject,
        text,
        html,
    }
}

/// Replaces the attachment sentence when the letter could not be rendered.
pub fn with_loa_link(mut email: RenderedEmail, ctx: &NotificationContext) -> RenderedEmail {
    let line = format!("Download your Letter of Acceptance at {}", ctx.loa_url());
    email.text = email
        .text
        .replace("Your Letter of Acceptance is attached.", &line);
    email.html = email.html.replace(
        "Your Letter of Acceptance is attached.",
        &escape_html(&line),
    );
    email
}
