//! French HTML bodies for team notifications.

use std::fmt::Write;
use ylab_core::{Purchase, TeamProfile};

use super::mailer::EmailMessage;

const SIGNATURE: &str = "<p>Merci de votre participation au YLab Hackathon 2025 !</p>";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn resource_name(purchase: &Purchase) -> String {
    purchase
        .resource
        .as_ref()
        .map(|r| escape(&r.name))
        .unwrap_or_else(|| format!("#{}", purchase.resource_id))
}

fn page(title: &str, team: &TeamProfile, content: &str) -> String {
    format!(
        "<html><body><h2>{}</h2><p>Bonjour {},</p>{}</body></html>",
        title,
        escape(&team.name),
        content
    )
}

fn message(team: &TeamProfile, subject: &str, html_body: String) -> EmailMessage {
    EmailMessage {
        to: team.email.clone(),
        subject: subject.to_string(),
        html_body,
    }
}

pub fn purchase_received(team: &TeamProfile, purchase: &Purchase) -> EmailMessage {
    let content = format!(
        "<p>Votre demande d'achat pour la ressource <b>{}</b> (quantité : {}) a bien été \
         enregistrée et est en attente de validation par l'administration.</p>\
         <p>Vous recevrez un email dès que votre demande sera traitée.</p>",
        resource_name(purchase),
        purchase.quantity
    );
    message(
        team,
        "Demande d'achat reçue - YLab Hackathon",
        page("Demande d'achat reçue", team, &content),
    )
}

pub fn batch_received(team: &TeamProfile, purchases: &[Purchase]) -> EmailMessage {
    let mut items = String::new();
    for p in purchases {
        let _ = write!(items, "<li>{} (quantité : {})</li>", resource_name(p), p.quantity);
    }

    let content = format!(
        "<p>Votre demande d'achat groupée pour {} ressource(s) a bien été enregistrée et est \
         en attente de validation par l'administration.</p>\
         <p><b>Ressources demandées :</b></p><ul>{}</ul>\
         <p>Vous recevrez un email dès que votre demande sera traitée.</p>",
        purchases.len(),
        items
    );
    message(
        team,
        "Demande d'achat groupée reçue - YLab Hackathon",
        page("Demande d'achat groupée reçue", team, &content),
    )
}

pub fn purchase_confirmed(team: &TeamProfile, purchase: &Purchase) -> EmailMessage {
    let content = format!(
        "<p>Votre achat a été confirmé avec succès :</p>\
         <ul><li>Ressource: {}</li><li>Quantité: {}</li></ul>{}",
        resource_name(purchase),
        purchase.quantity,
        SIGNATURE
    );
    message(
        team,
        "Achat confirmé - YLab Hackathon",
        page("Achat confirmé", team, &content),
    )
}

pub fn purchase_refused(team: &TeamProfile, purchase: &Purchase) -> EmailMessage {
    let content = format!(
        "<p>Votre demande d'achat a été refusée :</p>\
         <ul><li>Ressource: {}</li><li>Quantité: {}</li></ul>\
         <p>Vos crédits ont été restitués.</p>\
         <p>Pour plus d'informations, veuillez contacter l'organisation.</p>",
        resource_name(purchase),
        purchase.quantity
    );
    message(
        team,
        "Achat refusé - YLab Hackathon",
        page("Achat refusé", team, &content),
    )
}

pub fn return_processed(team: &TeamProfile, purchase: &Purchase) -> EmailMessage {
    let content = format!(
        "<p>Votre retour pour la ressource <b>{}</b> (quantité : {}) a été traité par \
         l'administration.</p><p>Statut de l'achat : {}</p>{}",
        resource_name(purchase),
        purchase.quantity,
        purchase.status,
        SIGNATURE
    );
    message(
        team,
        "Retour de ressource traité - YLab Hackathon",
        page("Retour de ressource traité", team, &content),
    )
}

/// Outcome of a batch decision for one team
#[derive(Debug, Clone)]
pub struct DecisionDigest {
    pub team: TeamProfile,
    pub confirmed: Vec<Purchase>,
    pub adjusted: Vec<Purchase>,
    pub refused: Vec<Purchase>,
}

impl DecisionDigest {
    pub fn new(team: TeamProfile) -> Self {
        Self {
            team,
            confirmed: Vec::new(),
            adjusted: Vec::new(),
            refused: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.adjusted.is_empty() && self.refused.is_empty()
    }

    /// Summary email, or `None` when nothing was decided for this team
    pub fn to_email(&self) -> Option<EmailMessage> {
        if self.is_empty() {
            return None;
        }

        let mut content =
            String::from("<p>Votre commande a été traitée par l'administration. Voici le résumé :</p>");

        if !self.confirmed.is_empty() {
            content.push_str("<h3>✅ Articles confirmés :</h3><ul>");
            for p in &self.confirmed {
                let _ = write!(content, "<li>{} - Quantité : {}</li>", resource_name(p), p.quantity);
            }
            content.push_str("</ul>");
        }

        if !self.adjusted.is_empty() {
            content.push_str("<h3>⚠️ Articles approuvés avec ajustement :</h3><ul>");
            for p in &self.adjusted {
                let _ = write!(
                    content,
                    "<li>{} - Quantité demandée : {}, Quantité approuvée : {}</li>",
                    resource_name(p),
                    p.requested_quantity,
                    p.quantity
                );
            }
            content.push_str(
                "</ul><p><em>La différence de crédit a été restituée sur votre compte.</em></p>",
            );
        }

        if !self.refused.is_empty() {
            content.push_str("<h3>❌ Articles refusés :</h3><ul>");
            for p in &self.refused {
                let _ = write!(content, "<li>{} - Quantité : {}</li>", resource_name(p), p.quantity);
            }
            content.push_str("</ul><p><em>Vos crédits ont été restitués.</em></p>");
        }

        content.push_str(SIGNATURE);

        Some(message(
            &self.team,
            "Traitement de votre commande - YLab Hackathon",
            page("Résumé du traitement de votre commande", &self.team, &content),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ylab_core::{PurchaseStatus, Resource, ResourceKind};

    fn team() -> TeamProfile {
        let now = Utc::now();
        TeamProfile {
            id: 1,
            name: "Les <Hackers>".to_string(),
            email: "hackers@ylab.fr".to_string(),
            credit: 500,
            last_activity: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn purchase(name: &str, quantity: i64, requested: i64) -> Purchase {
        let now = Utc::now();
        Purchase {
            id: 10,
            batch_id: None,
            team_id: 1,
            resource_id: 3,
            quantity,
            requested_quantity: requested,
            comment: String::new(),
            purchase_date: now,
            is_returned: false,
            needs_return: true,
            status: PurchaseStatus::Confirmed,
            created_at: now,
            updated_at: now,
            resource: Some(Resource {
                id: 3,
                name: name.to_string(),
                description: String::new(),
                cost: 50,
                quantity: 4,
                max_per_team: 2,
                kind: ResourceKind::Hardware,
                image_url: String::new(),
                is_active: true,
                is_non_returnable: false,
                created_at: now,
                updated_at: now,
            }),
            team: None,
        }
    }

    #[test]
    fn test_received_email() {
        let email = purchase_received(&team(), &purchase("Raspberry Pi", 2, 2));
        assert_eq!(email.to, "hackers@ylab.fr");
        assert_eq!(email.subject, "Demande d'achat reçue - YLab Hackathon");
        assert!(email.html_body.contains("<b>Raspberry Pi</b> (quantité : 2)"));
        assert!(email.html_body.contains("Bonjour Les &lt;Hackers&gt;,"));
    }

    #[test]
    fn test_batch_received_lists_items() {
        let email = batch_received(&team(), &[purchase("Arduino", 1, 1), purchase("GPU", 2, 2)]);
        assert!(email.html_body.contains("pour 2 ressource(s)"));
        assert!(email.html_body.contains("<li>Arduino (quantité : 1)</li>"));
        assert!(email.html_body.contains("<li>GPU (quantité : 2)</li>"));
    }

    #[test]
    fn test_return_processed_shows_status() {
        let email = return_processed(&team(), &purchase("GPU", 1, 1));
        assert_eq!(email.subject, "Retour de ressource traité - YLab Hackathon");
        assert!(email.html_body.contains("Statut de l'achat : confirmé"));
    }

    #[test]
    fn test_digest_sections() {
        let mut digest = DecisionDigest::new(team());
        assert!(digest.to_email().is_none());

        digest.confirmed.push(purchase("Arduino", 1, 1));
        digest.adjusted.push(purchase("GPU", 1, 3));
        let email = digest.to_email().unwrap();

        assert_eq!(email.subject, "Traitement de votre commande - YLab Hackathon");
        assert!(email.html_body.contains("Articles confirmés"));
        assert!(email.html_body.contains("Quantité demandée : 3, Quantité approuvée : 1"));
        assert!(!email.html_body.contains("Articles refusés"));
    }
}
