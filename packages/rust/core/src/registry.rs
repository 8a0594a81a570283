//! Tool registry: the built-in copywriting tools plus user-managed ones.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use offercopilot_shared::{
    InputKind, OfferCopilotError, OutputType, Result, ToolDefinition, ToolInput,
};
use offercopilot_storage::Storage;

// ---------------------------------------------------------------------------
// Built-in tools
// ---------------------------------------------------------------------------

fn input(id: &str, label: &str, kind: InputKind, placeholder: Option<&str>, required: bool) -> ToolInput {
    ToolInput {
        id: id.into(),
        label: label.into(),
        kind,
        placeholder: placeholder.map(Into::into),
        required,
        options: Vec::new(),
    }
}

struct Seed {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    prompt: &'static str,
    output_type: OutputType,
    category: &'static str,
    research_context: bool,
    inputs: Vec<ToolInput>,
}

/// The eight tools every fresh installation starts with.
pub fn default_tools() -> Vec<ToolDefinition> {
    use InputKind::{Number, Select, Text, Textarea};

    let mut emotion = input("emocao", "Emoção Principal", Select, None, true);
    emotion.options = ["Urgência", "Curiosidade", "Exclusividade", "Transformação", "Prova Social"]
        .into_iter()
        .map(String::from)
        .collect();

    let seeds = vec![
        Seed {
            id: "headline",
            name: "Headline Generator",
            description: "Crie headlines poderosas e irresistíveis",
            icon: "lightbulb",
            prompt: "Você é um copywriter experiente especializado em criar headlines que convertem. Crie headlines persuasivas baseadas nos inputs fornecidos.",
            output_type: OutputType::List,
            category: "Copywriting",
            research_context: false,
            inputs: vec![
                input("produto", "Produto/Serviço", Text, Some("Ex: Curso de Marketing Digital"), true),
                input("publico", "Público-Alvo", Text, Some("Ex: Empreendedores iniciantes"), true),
                emotion,
            ],
        },
        Seed {
            id: "hooks",
            name: "Hooks Generator",
            description: "Gere ganchos que capturam atenção",
            icon: "anchor",
            prompt: "Você é especialista em criar ganchos irresistíveis. Crie hooks que capturam atenção imediatamente.",
            output_type: OutputType::List,
            category: "Copywriting",
            research_context: false,
            inputs: vec![
                input("tema", "Tema", Text, Some("Ex: Emagrecimento"), true),
                input("angulo", "Ângulo", Textarea, Some("Ex: Método rápido e sem dieta"), true),
            ],
        },
        Seed {
            id: "vsl",
            name: "VSL Generator",
            description: "Scripts completos para Video Sales Letters",
            icon: "video",
            prompt: "Você é roteirista de VSL especializado em vendas. Crie roteiros completos e persuasivos.",
            output_type: OutputType::Text,
            category: "Video",
            research_context: false,
            inputs: vec![
                input("produto", "Produto", Text, None, true),
                input("problema", "Problema Principal", Textarea, None, true),
                input("solucao", "Solução Oferecida", Textarea, None, true),
            ],
        },
        Seed {
            id: "oferta",
            name: "Oferta Generator",
            description: "Estruture ofertas irresistíveis",
            icon: "gift",
            prompt: "Você é especialista em estruturar ofertas de alto valor. Crie ofertas irresistíveis e completas.",
            output_type: OutputType::Text,
            category: "Ofertas",
            research_context: false,
            inputs: vec![
                input("produto", "Produto Principal", Text, None, true),
                input("preco", "Preço", Number, None, true),
                input("bonus", "Bônus", Textarea, None, false),
            ],
        },
        Seed {
            id: "publico",
            name: "Pesquisa de Público",
            description: "Analise e entenda seu público-alvo",
            icon: "users",
            prompt: "Você é analista de público especializado. Analise profundamente o público-alvo fornecido.",
            output_type: OutputType::Text,
            category: "Pesquisa",
            research_context: true,
            inputs: vec![
                input("nicho", "Nicho", Text, None, true),
                input("produto", "Produto/Serviço", Text, None, true),
            ],
        },
        Seed {
            id: "persona",
            name: "Pesquisa de Persona",
            description: "Crie personas detalhadas",
            icon: "userCheck",
            prompt: "Você é especialista em criação de personas. Crie personas detalhadas e acionáveis.",
            output_type: OutputType::Json,
            category: "Pesquisa",
            research_context: true,
            inputs: vec![
                input("negocio", "Tipo de Negócio", Text, None, true),
                input("objetivo", "Objetivo da Persona", Textarea, None, true),
            ],
        },
        Seed {
            id: "editores",
            name: "Pesquisa de Editores",
            description: "Encontre editores de vídeo especializados",
            icon: "edit",
            prompt: "Você é recrutador especializado em profissionais de vídeo. Ajude a encontrar editores qualificados.",
            output_type: OutputType::List,
            category: "Recrutamento",
            research_context: false,
            inputs: vec![
                input("estilo", "Estilo de Edição", Text, None, true),
                input("budget", "Orçamento", Text, None, false),
            ],
        },
        Seed {
            id: "ganchos",
            name: "Tipos de Ganchos",
            description: "Explore diferentes tipos de ganchos",
            icon: "target",
            prompt: "Você é especialista em diferentes tipos de ganchos persuasivos. Explique e exemplifique diversos tipos.",
            output_type: OutputType::List,
            category: "Copywriting",
            research_context: false,
            inputs: vec![input("contexto", "Contexto de Uso", Text, None, true)],
        },
    ];

    let now = Utc::now();
    seeds
        .into_iter()
        .map(|s| ToolDefinition {
            id: s.id.into(),
            name: s.name.into(),
            description: s.description.into(),
            icon: s.icon.into(),
            prompt: s.prompt.into(),
            inputs: s.inputs,
            output_type: s.output_type,
            category: Some(s.category.into()),
            research_context: s.research_context,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Create / update payloads
// ---------------------------------------------------------------------------

/// A tool as submitted by the user, before timestamps are assigned.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    pub prompt: String,
    #[serde(default)]
    pub inputs: Vec<ToolInput>,
    #[serde(default = "default_output_type")]
    pub output_type: OutputType,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub research_context: bool,
}

fn default_icon() -> String {
    "lightbulb".into()
}

fn default_output_type() -> OutputType {
    OutputType::Text
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub prompt: Option<String>,
    pub inputs: Option<Vec<ToolInput>>,
    pub output_type: Option<OutputType>,
    pub category: Option<String>,
    pub research_context: Option<bool>,
}

fn check_definition(tool: &ToolDefinition) -> Result<()> {
    if tool.id.trim().is_empty() {
        return Err(OfferCopilotError::validation("tool id must not be empty"));
    }
    if tool.name.trim().is_empty() {
        return Err(OfferCopilotError::validation("tool name must not be empty"));
    }
    for (i, field) in tool.inputs.iter().enumerate() {
        if field.id.trim().is_empty() {
            return Err(OfferCopilotError::validation(format!(
                "input #{} has an empty id",
                i + 1
            )));
        }
        if tool.inputs[..i].iter().any(|other| other.id == field.id) {
            return Err(OfferCopilotError::validation(format!(
                "duplicate input id '{}'",
                field.id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// CRUD over the stored tools.
pub struct ToolRegistry<'a> {
    storage: &'a Storage,
}

impl<'a> ToolRegistry<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Seed the built-in tools if none are stored yet, then return every tool.
    #[instrument(skip_all)]
    pub async fn initialize(&self) -> Result<Vec<ToolDefinition>> {
        if self.storage.count_tools().await? == 0 {
            let defaults = default_tools();
            for tool in &defaults {
                self.storage.insert_tool(tool).await?;
            }
            info!(count = defaults.len(), "seeded default tools");
        }
        self.all().await
    }

    pub async fn all(&self) -> Result<Vec<ToolDefinition>> {
        self.storage.list_tools().await
    }

    pub async fn get(&self, id: &str) -> Result<ToolDefinition> {
        self.storage
            .get_tool(id)
            .await?
            .ok_or_else(|| OfferCopilotError::not_found("tool", id))
    }

    #[instrument(skip_all, fields(id = %new.id))]
    pub async fn create(&self, new: NewTool) -> Result<ToolDefinition> {
        let now = Utc::now();
        let tool = ToolDefinition {
            id: new.id.trim().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            icon: new.icon,
            prompt: new.prompt,
            inputs: new.inputs,
            output_type: new.output_type,
            category: new.category.filter(|c| !c.trim().is_empty()),
            research_context: new.research_context,
            created_at: now,
            updated_at: now,
        };
        check_definition(&tool)?;

        self.storage.insert_tool(&tool).await?;
        info!(name = %tool.name, "tool created");
        Ok(tool)
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn update(&self, id: &str, update: ToolUpdate) -> Result<ToolDefinition> {
        let mut tool = self.get(id).await?;

        if let Some(name) = update.name {
            tool.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            tool.description = description;
        }
        if let Some(icon) = update.icon {
            tool.icon = icon;
        }
        if let Some(prompt) = update.prompt {
            tool.prompt = prompt;
        }
        if let Some(inputs) = update.inputs {
            tool.inputs = inputs;
        }
        if let Some(output_type) = update.output_type {
            tool.output_type = output_type;
        }
        if let Some(category) = update.category {
            tool.category = Some(category).filter(|c| !c.trim().is_empty());
        }
        if let Some(research_context) = update.research_context {
            tool.research_context = research_context;
        }
        tool.updated_at = Utc::now();
        check_definition(&tool)?;

        if !self.storage.update_tool(&tool).await? {
            return Err(OfferCopilotError::not_found("tool", id));
        }
        info!("tool updated");
        Ok(tool)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.storage.delete_tool(id).await? {
            return Err(OfferCopilotError::not_found("tool", id));
        }
        info!(id, "tool deleted");
        Ok(())
    }

    pub async fn by_category(&self, category: &str) -> Result<Vec<ToolDefinition>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|t| t.category.as_deref() == Some(category))
            .collect())
    }

    /// Distinct categories in first-seen order.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let mut seen: Vec<String> = Vec::new();
        for tool in self.all().await? {
            if let Some(category) = tool.category {
                if !seen.contains(&category) {
                    seen.push(category);
                }
            }
        }
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn new_tool(id: &str) -> NewTool {
        NewTool {
            id: id.into(),
            name: "Bio Generator".into(),
            description: "Bios curtas".into(),
            icon: default_icon(),
            prompt: "Escreva bios.".into(),
            inputs: vec![input("nome", "Nome", InputKind::Text, None, true)],
            output_type: OutputType::Text,
            category: Some("Social".into()),
            research_context: false,
        }
    }

    #[test]
    fn defaults_are_complete() {
        let tools = default_tools();
        let ids: Vec<&str> = tools.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["headline", "hooks", "vsl", "oferta", "publico", "persona", "editores", "ganchos"]
        );

        let research: Vec<&str> = tools
            .iter()
            .filter(|t| t.research_context)
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(research, vec!["publico", "persona"]);

        let headline = &tools[0];
        assert_eq!(headline.inputs[2].kind, InputKind::Select);
        assert_eq!(headline.inputs[2].options.len(), 5);

        for tool in &tools {
            check_definition(tool).expect("default tool is valid");
        }
    }

    #[tokio::test]
    async fn initialize_seeds_once() {
        let storage = test_storage().await;
        let registry = ToolRegistry::new(&storage);

        assert_eq!(registry.initialize().await.unwrap().len(), 8);
        registry.delete("ganchos").await.unwrap();
        assert_eq!(registry.initialize().await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn create_get_and_delete() {
        let storage = test_storage().await;
        let registry = ToolRegistry::new(&storage);

        let created = registry.create(new_tool("bio")).await.unwrap();
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(registry.get("bio").await.unwrap(), created);

        let dup = registry.create(new_tool("bio")).await.unwrap_err();
        assert!(matches!(dup, OfferCopilotError::Validation { .. }));

        registry.delete("bio").await.unwrap();
        let gone = registry.get("bio").await.unwrap_err();
        assert_eq!(gone.to_string(), "tool not found: bio");
        assert!(matches!(
            registry.delete("bio").await.unwrap_err(),
            OfferCopilotError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let storage = test_storage().await;
        let registry = ToolRegistry::new(&storage);

        let mut blank_name = new_tool("x");
        blank_name.name = "  ".into();
        assert!(registry.create(blank_name).await.is_err());

        let mut dup_inputs = new_tool("y");
        dup_inputs.inputs.push(input("nome", "Outro", InputKind::Text, None, false));
        let err = registry.create(dup_inputs).await.unwrap_err();
        assert!(err.to_string().contains("duplicate input id"));
    }

    #[tokio::test]
    async fn update_is_partial() {
        let storage = test_storage().await;
        let registry = ToolRegistry::new(&storage);
        let created = registry.create(new_tool("bio")).await.unwrap();

        let updated = registry
            .update(
                "bio",
                ToolUpdate {
                    prompt: Some("Escreva bios curtas.".into()),
                    research_context: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, created.name);
        assert_eq!(updated.prompt, "Escreva bios curtas.");
        assert!(updated.research_context);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(registry.get("bio").await.unwrap(), updated);

        let missing = registry.update("nope", ToolUpdate::default()).await;
        assert!(matches!(missing, Err(OfferCopilotError::NotFound { .. })));
    }

    #[tokio::test]
    async fn categories_and_filtering() {
        let storage = test_storage().await;
        let registry = ToolRegistry::new(&storage);
        registry.initialize().await.unwrap();

        assert_eq!(
            registry.categories().await.unwrap(),
            vec!["Copywriting", "Video", "Ofertas", "Pesquisa", "Recrutamento"]
        );

        let copy: Vec<String> = registry
            .by_category("Copywriting")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(copy, vec!["headline", "hooks", "ganchos"]);
        assert!(registry.by_category("Inexistente").await.unwrap().is_empty());
    }

    #[test]
    fn new_tool_from_json_fills_defaults() {
        let tool: NewTool = serde_json::from_str(
            r#"{"id":"bio","name":"Bio","prompt":"p","inputs":[{"id":"nome","label":"Nome","type":"text","required":true}]}"#,
        )
        .unwrap();
        assert_eq!(tool.icon, "lightbulb");
        assert_eq!(tool.output_type, OutputType::Text);
        assert_eq!(tool.inputs[0].kind, InputKind::Text);
        assert!(!tool.research_context);
    }
}
