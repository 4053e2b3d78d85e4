//! Prompt template store
//!
//! Holds the name -> template map used by every agent. Templates live in a
//! single JSON file so the self-correction cycle can rewrite them at
//! runtime; writes are fsync-then-rename so a crash never leaves a torn
//! file. Missing names resolve to an error template instead of failing.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct PromptStore {
    path: PathBuf,
    templates: RwLock<HashMap<String, String>>,
}

impl PromptStore {
    /// Open the store at `path`, seeding built-in defaults for any prompt
    /// not present in the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut templates = builtin_prompts();

        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(loaded) => {
                    info!(count = loaded.len(), path = %path.display(), "loaded prompts");
                    templates.extend(loaded);
                }
                Err(e) => warn!("failed to parse prompts file {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to read prompts file {}: {}", path.display(), e),
        }

        Ok(Self {
            path,
            templates: RwLock::new(templates),
        })
    }

    /// In-memory store with only the built-in defaults. Used in tests.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            templates: RwLock::new(builtin_prompts()),
        }
    }

    /// Get the template for `name`. Unknown names return an error template
    /// rather than failing, so a broken prompt key degrades the answer
    /// instead of the request.
    pub fn get(&self, name: &str) -> String {
        let templates = self.templates.read();
        match templates.get(name) {
            Some(t) => t.clone(),
            None => {
                warn!("prompt '{}' not found", name);
                format!("ERROR: Prompt '{}' not found.", name)
            }
        }
    }

    /// Render the named template with `vars` via tera.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self.get(name);
        let mut context = tera::Context::new();
        for (key, value) in vars {
            context.insert(*key, value);
        }
        Ok(tera::Tera::one_off(&template, &context, false)?)
    }

    /// Replace an existing template and persist the whole map. Returns
    /// false when `name` is unknown; new prompts are not invented at
    /// runtime.
    pub fn update(&self, name: &str, new_template: &str) -> Result<bool> {
        {
            let mut templates = self.templates.write();
            if !templates.contains_key(name) {
                warn!("attempted to update non-existent prompt '{}'", name);
                return Ok(false);
            }
            templates.insert(name.to_string(), new_template.to_string());
        }
        self.save()?;
        info!("prompt '{}' updated", name);
        Ok(true)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Write the current map to disk: temp file in the same directory,
    /// fsync, rename over the target.
    pub fn save(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let serialized = {
            let templates = self.templates.read();
            serde_json::to_string_pretty(&*templates)?
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Built-in templates for every prompt key the agents use. The store file
/// overrides these; the self-correction cycle mutates them through
/// [`PromptStore::update`].
fn builtin_prompts() -> HashMap<String, String> {
    let defaults: &[(&str, &str)] = &[
        (
            "ROUTING_PROMPT",
            "Decide how the following question should be answered.\n\
             Reply with JSON of the form { \"route\": \"RAG\" } when internal knowledge \
             retrieval would help, or { \"route\": \"DIRECT\" } when the question can be \
             answered directly.\n\nQuestion: {{ query }}\n---\nDecision (JSON):",
        ),
        (
            "DIRECT_RESPONSE_PROMPT",
            "You are a helpful assistant. Answer the question below directly and \
             concisely.\n\nQuestion: {{ query }}\n---\nAnswer:",
        ),
        (
            "SIMPLE_RAG_PROMPT",
            "Answer the question using the retrieved context. If the context does not \
             contain the answer, say so.\n\nQuestion: {{ query }}\n\nRetrieved context:\n\
             {{ retrieved_info }}\n---\nAnswer:",
        ),
        (
            "PLANNING_PROMPT",
            "You are a planning specialist. Produce a short, numbered plan of thinking \
             steps for answering the request below. {{ reasoning_instruction }}\n\n\
             Request: {{ query }}\n---\nPlan:",
        ),
        (
            "MODULE_SELECTION_PROMPT",
            "You are a thinking strategist. From the modules below, list the most \
             effective ones for the request, in order, comma separated.\n\n\
             Available modules:\n\
             - DECOMPOSE: break a complex problem into simpler subtasks.\n\
             - CRITIQUE: point out weaknesses and flaws in a proposal.\n\
             - SYNTHESIZE: merge several pieces of information into a conclusion.\n\
             - RAG_SEARCH: search the knowledge base for relevant information.\n\n\
             Request: {{ query }}\n---\n\
             Module sequence (example: DECOMPOSE, RAG_SEARCH, SYNTHESIZE):",
        ),
        (
            "MASTER_AGENT_PROMPT",
            "You are the master agent that oversees the whole cognitive architecture.\n\
             Compose the final answer to the user. {{ reasoning_instruction }}\n\n\
             Request: {{ query }}\n\nPlan:\n{{ plan }}\n\n\
             Cognitive loop findings:\n{{ cognitive_loop_output }}\n\n\
             Recent background research:\n{{ recent_autonomous_thoughts }}\n\n\
             Recent self-improvement decisions:\n{{ recent_self_improvement_insights }}\n\
             ---\nFinal answer:",
        ),
        (
            "COGNITIVE_SYNTHESIS_PROMPT",
            "Synthesize a single comprehensive analysis for the request below.\n\
             {{ reasoning_instruction }}\n\nRequest: {{ query }}\n\nPlan:\n{{ plan }}\n\n\
             Long-term memory context:\n{{ long_term_memory_context }}\n\n\
             Collected information:\n{{ final_retrieved_info }}\n\n\
             Simulation insights:\n{{ physical_insights }}\n---\nSynthesis:",
        ),
        (
            "RETRIEVAL_EVALUATOR_PROMPT",
            "Evaluate the quality of the retrieved information for the query.\n\
             Reply with JSON containing integer scores from 0 to 10: \
             { \"relevance_score\": 0, \"completeness_score\": 0, \"summary\": \"...\", \
             \"suggestions\": \"...\" }\n\nQuery: {{ query }}\n\n\
             Retrieved information:\n{{ retrieved_info }}\n---\nEvaluation (JSON):",
        ),
        (
            "QUERY_REFINEMENT_PROMPT",
            "The previous search did not surface enough information. Based on the \
             evaluation below, produce one improved search query.\n\n\
             Original query: {{ query }}\n\nEvaluation summary: {{ evaluation_summary }}\n\
             Suggestions: {{ suggestions }}\n---\nRefined query:",
        ),
        (
            "TOOL_SELECTION_PROMPT",
            "Select the best tool for the task from the list below. Reply with exactly \
             one line of the form `ToolName: tool input`.\n\nAvailable tools:\n{{ tools }}\n\n\
             Task: {{ task }}\n---\nSelection:",
        ),
        (
            "THOUGHT_GENERATION_PROMPT",
            "You are exploring solutions step by step.\n\nProblem: {{ query }}\n\n\
             {{ context }}\n---\nNext thought:",
        ),
        (
            "THOUGHT_EVALUATION_PROMPT",
            "Rate how promising the following path of thought is for solving the \
             problem. Reply with JSON: { \"score\": 0.0 } where score is between 0 and 1.\n\n\
             Problem: {{ query }}\n\nThought path:\n{{ thought_path }}\n---\nRating (JSON):",
        ),
        (
            "HYPOTHESIS_PROMPT",
            "You are an inventive mathematician. Given the problem and what is already \
             known, propose exactly one new hypothesis or auxiliary construction that \
             could advance the solution.\n\nProblem: {{ query }}\n\
             Known facts: {{ known_facts }}\n---\nNew hypothesis/construction:",
        ),
        (
            "DEDUCTIVE_REASONING_PROMPT",
            "You are a strict deductive reasoner. Using only the verified facts below, \
             state the strongest conclusion currently justified. Do not speculate.\n\n\
             Problem: {{ query }}\nKnown facts: {{ known_facts }}\n---\nConclusion:",
        ),
        (
            "KNOWLEDGE_GRAPH_PROMPT",
            "Extract a knowledge graph from the text. Reply with JSON: \
             { \"nodes\": [ { \"id\": \"...\", \"label\": \"...\", \"properties\": { } } ], \
             \"edges\": [ { \"source\": \"...\", \"target\": \"...\", \"label\": \"...\", \
             \"weight\": 1.0, \"properties\": { } } ] }\n\n\
             Text:\n{{ text_chunk }}\n---\nKnowledge graph (JSON):",
        ),
        (
            "CAPABILITY_MAPPER_PROMPT",
            "Map the benchmark report below onto a knowledge graph describing the \
             system's capabilities. Use the same JSON shape as a knowledge graph with \
             nodes and edges.\n\nBenchmark report:\n{{ benchmark_report }}\n---\n\
             Capability graph (JSON):",
        ),
        (
            "KNOWLEDGE_GAP_PROMPT",
            "Compare the recent user queries with the current knowledge graph summary \
             and identify at most one topic where knowledge is clearly lacking. Reply \
             with JSON: { \"topic\": \"...\" } or { \"topic\": null } when there is no \
             significant gap.\n\nRecent queries:\n- {{ recent_queries }}\n\n\
             Knowledge graph summary:\n{{ knowledge_graph_summary }}\n---\nGap (JSON):",
        ),
        (
            "PROCESS_REWARD_PROMPT",
            "Score the quality and usefulness of one step of a reasoning process. \
             Reply with JSON: { \"reward_score\": 0.0, \"justification\": \"...\" } with \
             the score between 0 and 1.\n\nQuery: {{ query }}\nStep name: {{ step_name }}\n\
             Step content:\n{{ step_content }}\n---\nScore (JSON):",
        ),
        (
            "SELF_CRITICISM_PROMPT",
            "You are a meta-cognitive critic. Review the reasoning process and final \
             answer below and describe their weaknesses. If there are none, reply with \
             exactly: no issues found\n\nQuery: {{ query }}\n\nPlan:\n{{ plan }}\n\n\
             Cognitive loop output:\n{{ cognitive_loop_output }}\n\n\
             Final answer:\n{{ final_answer }}\n---\nCritique:",
        ),
        (
            "PROBLEM_DISCOVERY_PROMPT",
            "From the query and analysis below, surface potential problems or \
             unstated follow-up questions the user may care about. Reply with a JSON \
             array of short strings.\n\nQuery: {{ query }}\n\nPlan:\n{{ plan }}\n\n\
             Analysis:\n{{ cognitive_loop_output }}\n---\nProblems (JSON array):",
        ),
        (
            "SELF_IMPROVEMENT_PROMPT",
            "You design improvements for an AI system based on its self-criticism and \
             per-step rewards. Reply with a JSON array of suggestions, each of the form \
             { \"type\": \"CreateMicroLLM\" | \"PromptRefinement\", \"details\": { } }. \
             For CreateMicroLLM include details.topic; for PromptRefinement include \
             details.target_prompt_key and details.new_prompt_suggestion.\n\n\
             Trace:\n{{ trace_data }}\n\nProcess feedback:\n{{ process_feedback }}\n\n\
             Self-criticism:\n{{ self_criticism }}\n---\nSuggestions (JSON array):",
        ),
        (
            "SELF_CORRECTION_PROMPT",
            "Review the improvement suggestions below and summarize which should be \
             applied and why. If none are worth applying, reply with exactly: \
             no suggestions to apply\n\nSuggestions:\n{{ improvement_suggestions }}\n---\n\
             Decision:",
        ),
        (
            "INTEGRATED_INFORMATION_PROMPT",
            "You are a philosophical synthesizer. Take the viewpoints below and, rather \
             than summarizing them, analyze their relationships, hidden assumptions, \
             shared themes and the new questions raised by their disagreements. Produce \
             one integrated, insightful answer to the original request.\n\n\
             Original request:\n{{ query }}\n\nViewpoints:\n{{ persona_outputs }}\n---\n\
             Integrated answer:",
        ),
        (
            "DIALOGUE_PARTICIPANTS_PROMPT",
            "Generate five thinking agents with genuinely independent perspectives to \
             debate the request below. Reply with JSON: { \"participants\": [ \
             { \"name\": \"...\", \"persona\": \"...\" } ] }\n\n\
             Request: {{ query }}\n---\nParticipants (JSON):",
        ),
        (
            "MEDIATOR_PROMPT",
            "You are facilitating a debate between thinking agents. Given the request \
             and the dialogue so far, either pose a question to a specific participant \
             (mention them as @Name), restate the open points, or, when the discussion \
             has matured, instruct the group to integrate a conclusion (use the word \
             'conclusion').\n\nRequest: {{ query }}\n\nDialogue so far:\n\
             {{ dialogue_history }}\n---\nNext action:",
        ),
        (
            "PARTICIPANT_TURN_PROMPT",
            "You are {{ persona }}\nGiven the original request and the discussion so \
             far, state your view from your own perspective.\n\n\
             Request: {{ query }}\n\nDiscussion so far:\n{{ history }}\n---\n\
             Your view (@{{ name }}):",
        ),
        (
            "DECOMPOSE_PROMPT",
            "You break problems into small steps. Decompose the complex request below \
             into a list of simpler subtasks.\n\nRequest: {{ query }}\n---\nSubtasks:",
        ),
        (
            "CRITIQUE_PROMPT",
            "You are a sharp critic. Point out the weaknesses, flaws or omissions in \
             the proposal below.\n\nProposal: {{ draft }}\n---\nCritique:",
        ),
        (
            "SYNTHESIZE_PROMPT",
            "You integrate diverse information. Combine the pieces below into one \
             coherent, comprehensive conclusion.\n\nInformation:\n{{ information_list }}\n\
             ---\nSynthesis:",
        ),
        (
            "SUMMARIZER_PROMPT",
            "Summarize the web page content below so that it answers the user's \
             question.\n\nQuestion: {{ question }}\n\nPage content:\n{{ page_content }}\n\
             ---\nSummary:",
        ),
        (
            "COMPLEXITY_ANALYSIS_PROMPT",
            "Classify the complexity of the user's request. Reply with JSON: \
             { \"complexity_level\": \"Level X\", \"reason\": \"...\" }\n\n\
             Categories:\n\
             - Level 1 (Simple): greetings or simple factual checks answerable \
             immediately.\n\
             - Level 2 (Moderate): answerable with a single tool such as a web or \
             database search; some reasoning needed.\n\
             - Level 3 (Complex): requires combining sources and multi-step reasoning, \
             creative proposals or detailed planning.\n\
             - Level 4 (Highly Complex): philosophical or abstract questions requiring \
             integrated cross-domain knowledge and introspective processes.\n\n\
             Request: {{ query }}\n---\nAssessment (JSON):",
        ),
        (
            "ORCHESTRATION_PROMPT",
            "Choose the best execution mode for the request. Available modes: simple, \
             full, parallel, quantum, speculative, self_discover, internal_dialogue, \
             conceptual_reasoning, micro_llm_expert, tree_of_thoughts, \
             iterative_correction.\n\
             Reply with JSON: { \"chosen_mode\": \"...\", \"reasoning\": \"...\", \
             \"confidence_score\": 0.0, \"parameters\": { } }\n\n\
             Request: {{ query }}\nComplexity: {{ complexity_level }}\n\
             Affective state: {{ affective_state }}\n---\nDecision (JSON):",
        ),
        (
            "EXPERT_MATCH_PROMPT",
            "You are a manager who routes tasks to specialists. Decide whether the \
             request below matches the domain of one of the specialist tools. If it \
             does, reply with that tool's name; otherwise reply with exactly: none\n\n\
             Specialist tools:\n{{ tools }}\n\nRequest: {{ query }}\n---\n\
             Decision (tool name or none):",
        ),
        (
            "EXPERT_FORMATTER_PROMPT",
            "Rewrite the specialist's answer below into a natural, clear response to \
             the user's original question.\n\nOriginal question:\n{{ user_query }}\n\n\
             Specialist's answer:\n{{ expert_answer }}\n---\nFinal answer:",
        ),
        (
            "DRAFT_PROMPT",
            "You are a fast brainstorming assistant. Produce a rough draft of thinking \
             for the request below; it does not have to be perfect.\n\n\
             Request: {{ query }}\n---\nDraft:",
        ),
        (
            "VERIFICATION_PROMPT",
            "You are an editor and fact-checker. Review the drafts below, extract the \
             most accurate material, resolve contradictions and produce one polished \
             final answer.\n\nOriginal request: {{ query }}\n\nDrafts:\n{{ drafts }}\n---\n\
             Verified final answer:",
        ),
        (
            "SPECULATIVE_CORRECTION_PROMPT",
            "Propose an improved version of the current piece of work. Keep the \
             original intent.\n\nOriginal:\n{{ original_code }}\n\n\
             Current version:\n{{ current_code }}\n---\nProposed fix:",
        ),
        (
            "STEP_VERIFICATION_PROMPT",
            "Verify the proposed fix step by step against the original. Reply with \
             JSON: { \"is_correct\": true, \"issues\": \"...\" }\n\n\
             Original:\n{{ original_code }}\n\nProposed fix:\n{{ proposed_fix }}\n---\n\
             Verdict (JSON):",
        ),
        (
            "PERSONA_RESPONSE_PROMPT",
            "{{ persona }}\nStay fully in the persona above and answer the request.\n\n\
             Request: {{ query }}\n---\nAnswer in persona:",
        ),
        (
            "PARALLEL_SELECTION_PROMPT",
            "You are an editor-in-chief integrating several analyses. Read the results \
             below and produce the single most comprehensive, highest-quality final \
             answer to the original request.\n\nOriginal request: {{ query }}\n\n\
             Analyses:\n{{ results }}\n---\nIntegrated final answer:",
        ),
        (
            "CONSOLIDATION_PROMPT",
            "You consolidate short-term memory into durable knowledge. From the \
             prediction errors below, extract the genuinely novel facts as concise \
             bullet lines, one fact per line.\n\nPrediction errors:\n\
             {{ prediction_errors }}\n---\nConsolidated facts:",
        ),
        (
            "WISDOM_SYNTHESIS_PROMPT",
            "Reflect on the knowledge graph below and distill one or two deeper, \
             cross-cutting insights it implies.\n\nKnowledge graph:\n\
             {{ knowledge_graph_summary }}\n---\nSynthesized wisdom:",
        ),
        (
            "RESEARCH_SYNTHESIS_PROMPT",
            "You are an excellent researcher. From the topic and collected material \
             below, produce three to five concise, objective bullet-point facts.\n\n\
             Topic: {{ topic }}\n\nCollected material:\n{{ information }}\n---\n\
             Synthesized knowledge:",
        ),
    ];

    defaults
        .iter()
        .map(|(name, template)| (name.to_string(), template.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_known_prompt() {
        let store = PromptStore::ephemeral();
        let template = store.get("ROUTING_PROMPT");
        assert!(template.contains("RAG"));
    }

    #[test]
    fn test_get_unknown_prompt_returns_error_template() {
        let store = PromptStore::ephemeral();
        let template = store.get("NO_SUCH_PROMPT");
        assert!(template.starts_with("ERROR: Prompt"));
    }

    #[test]
    fn test_render_substitutes_variables() {
        let store = PromptStore::ephemeral();
        let rendered = store
            .render("DIRECT_RESPONSE_PROMPT", &[("query", "what is rust?")])
            .unwrap();
        assert!(rendered.contains("what is rust?"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_update_unknown_prompt_is_rejected() {
        let store = PromptStore::ephemeral();
        assert!(!store.update("NO_SUCH_PROMPT", "x").unwrap());
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");

        let store = PromptStore::open(&path).unwrap();
        assert!(store
            .update("DIRECT_RESPONSE_PROMPT", "Answer briefly: {{ query }}")
            .unwrap());

        let reloaded = PromptStore::open(&path).unwrap();
        assert_eq!(
            reloaded.get("DIRECT_RESPONSE_PROMPT"),
            "Answer briefly: {{ query }}"
        );
    }

    #[test]
    fn test_all_builtin_templates_render() {
        // Every built-in template must be valid tera with generic vars.
        let store = PromptStore::ephemeral();
        let vars: Vec<(&str, &str)> = vec![
            ("query", "q"),
            ("retrieved_info", "r"),
            ("reasoning_instruction", ""),
            ("plan", "p"),
            ("cognitive_loop_output", "c"),
            ("recent_autonomous_thoughts", ""),
            ("recent_self_improvement_insights", ""),
            ("long_term_memory_context", ""),
            ("final_retrieved_info", ""),
            ("physical_insights", ""),
            ("evaluation_summary", ""),
            ("suggestions", ""),
            ("tools", ""),
            ("task", ""),
            ("context", ""),
            ("thought_path", ""),
            ("known_facts", ""),
            ("text_chunk", ""),
            ("benchmark_report", ""),
            ("recent_queries", ""),
            ("knowledge_graph_summary", ""),
            ("step_name", ""),
            ("step_content", ""),
            ("final_answer", ""),
            ("trace_data", ""),
            ("process_feedback", ""),
            ("self_criticism", ""),
            ("improvement_suggestions", ""),
            ("persona_outputs", ""),
            ("dialogue_history", ""),
            ("persona", ""),
            ("name", ""),
            ("history", ""),
            ("draft", ""),
            ("information_list", ""),
            ("question", ""),
            ("page_content", ""),
            ("complexity_level", ""),
            ("affective_state", ""),
            ("user_query", ""),
            ("expert_answer", ""),
            ("drafts", ""),
            ("original_code", ""),
            ("current_code", ""),
            ("proposed_fix", ""),
            ("results", ""),
            ("prediction_errors", ""),
            ("information", ""),
            ("topic", ""),
        ];
        for name in store.names() {
            let rendered = store.render(&name, &vars);
            assert!(rendered.is_ok(), "template '{}' failed to render", name);
        }
    }
}
